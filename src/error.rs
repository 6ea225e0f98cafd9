//! Error types for the board client.

use crate::types::ItemId;
use thiserror::Error;

/// Main error type for board operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Backend error during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Invalid subscription transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Feed channel closed: {0}")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Shorthand for a failed remote call.
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        SyncError::Backend {
            operation,
            message: message.into(),
        }
    }

    /// Shorthand for a rejected input field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SyncError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, SyncError>;
