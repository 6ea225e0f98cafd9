//! Client configuration.

use crate::error::{Result, SyncError};

/// Environment variable holding the platform endpoint.
pub const ENDPOINT_VAR: &str = "TASKBOARD_URL";

/// Environment variable holding the platform's public (anon) key.
pub const PUBLIC_KEY_VAR: &str = "TASKBOARD_PUBLIC_KEY";

/// Default max buffered change events per feed channel.
pub const DEFAULT_FEED_BUFFER_SIZE: usize = 256;

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the hosted platform.
    pub endpoint: String,

    /// Public key sent with every request.
    pub public_key: String,

    /// Prefix for client-minted item ids.
    /// Default: "temp-"
    pub temp_id_prefix: String,

    /// Max buffered change events per feed channel.
    /// Default: 256
    pub feed_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321".to_string(),
            public_key: String::new(),
            temp_id_prefix: "temp-".to_string(),
            feed_buffer_size: DEFAULT_FEED_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Read endpoint and key from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup(ENDPOINT_VAR)
            .ok_or_else(|| SyncError::Config(format!("{ENDPOINT_VAR} is not set")))?;
        let public_key = lookup(PUBLIC_KEY_VAR)
            .ok_or_else(|| SyncError::Config(format!("{PUBLIC_KEY_VAR} is not set")))?;

        let config = Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            public_key: public_key.trim().to_string(),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.public_key.is_empty() {
            return Err(SyncError::Config("public key is empty".to_string()));
        }
        if self.temp_id_prefix.is_empty() {
            return Err(SyncError::Config("temp id prefix is empty".to_string()));
        }
        if self.feed_buffer_size == 0 {
            return Err(SyncError::Config("feed buffer size must be positive".to_string()));
        }
        Ok(())
    }
}
