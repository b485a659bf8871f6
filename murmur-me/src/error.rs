//! Error types for murmur-me

use murmur_core::Error as CoreError;
use thiserror::Error;

/// Avatar link errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Authentication token missing from response")]
    MissingToken,

    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AvatarError> for CoreError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::Config(msg) => CoreError::Config(msg),
            other => CoreError::Avatar(other.to_string()),
        }
    }
}
