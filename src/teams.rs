//! Team creation.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Allowed team name length, in characters after trimming.
pub const TEAM_NAME_MIN: usize = 2;
pub const TEAM_NAME_MAX: usize = 50;

/// Max description length, in characters after trimming.
pub const TEAM_DESCRIPTION_MAX: usize = 500;

/// Raw team form input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Team input that passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    name: String,
    description: Option<String>,
}

impl NewTeam {
    /// Trimmed team name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trimmed description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A stored team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl TeamInput {
    /// Input with a name and no description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trim and check the input. A blank description is treated as absent.
    pub fn validate(&self) -> Result<NewTeam> {
        let name = self.name.trim();
        let len = name.chars().count();
        if len < TEAM_NAME_MIN {
            return Err(SyncError::validation(
                "name",
                format!("must be at least {TEAM_NAME_MIN} characters"),
            ));
        }
        if len > TEAM_NAME_MAX {
            return Err(SyncError::validation(
                "name",
                format!("must be at most {TEAM_NAME_MAX} characters"),
            ));
        }

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        if let Some(d) = description {
            if d.chars().count() > TEAM_DESCRIPTION_MAX {
                return Err(SyncError::validation(
                    "description",
                    format!("must be at most {TEAM_DESCRIPTION_MAX} characters"),
                ));
            }
        }

        Ok(NewTeam {
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }
}

/// Team operations on the authoritative store.
pub trait TeamBackend: Send + Sync {
    fn create_team(&self, team: &NewTeam) -> Result<Team>;
}

/// Validate `input` and create the team. Nothing is sent when validation fails.
pub fn create_team<B: TeamBackend + ?Sized>(backend: &B, input: &TeamInput) -> Result<Team> {
    let team = input.validate()?;
    let created = backend.create_team(&team)?;
    info!(team = %created.id, name = %created.name, "team created");
    Ok(created)
}
