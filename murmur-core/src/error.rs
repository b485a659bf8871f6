//! Error types shared by every murmur crate

use std::fmt;
use thiserror::Error;

/// Maximum number of bytes of a remote error body kept in an error message
const MAX_ERROR_BODY_BYTES: usize = 500;

/// How a failed remote call should be treated by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 5xx response
    TransientServer,
    /// 429 response
    RateLimited,
    /// Timeout, refused or reset connection, interrupted body
    TransientNetwork,
    /// 4xx other than 429
    FatalClient,
    /// Anything the policy does not recognise
    Unclassified,
}

impl FailureClass {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureClass::RateLimited,
            500..=599 => FailureClass::TransientServer,
            400..=499 => FailureClass::FatalClient,
            _ => FailureClass::Unclassified,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureClass::TransientServer | FailureClass::RateLimited | FailureClass::TransientNetwork
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::TransientServer => "transient-server",
            FailureClass::RateLimited => "rate-limited",
            FailureClass::TransientNetwork => "transient-network",
            FailureClass::FatalClient => "fatal-client",
            FailureClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of exactly one outbound call, carrying its classification
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequestError {
    pub class: FailureClass,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteRequestError {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from a non-success HTTP status and its (possibly long) body
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            class: FailureClass::from_status(status),
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn transient_network(message: impl Into<String>) -> Self {
        Self::new(FailureClass::TransientNetwork, message)
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Unclassified, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.class.is_retryable()
    }
}

impl fmt::Display for RemoteRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure (HTTP {}): {}", self.class, status, self.message),
            None => write!(f, "{} failure: {}", self.class, self.message),
        }
    }
}

impl std::error::Error for RemoteRequestError {}

impl From<reqwest::Error> for RemoteRequestError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self {
                class: FailureClass::from_status(status.as_u16()),
                status: Some(status.as_u16()),
                message: err.to_string(),
            };
        }

        let class = if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            FailureClass::TransientNetwork
        } else {
            FailureClass::Unclassified
        };
        Self::new(class, err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Top-level error taxonomy
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} failed: {source}")]
    Request {
        operation: String,
        #[source]
        source: RemoteRequestError,
    },

    #[error("{operation} failed after {attempts} attempts (last error: {last})")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: RemoteRequestError,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Avatar protocol error: {0}")]
    Avatar(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Underlying remote failure, if this error came from a remote call
    pub fn remote(&self) -> Option<&RemoteRequestError> {
        match self {
            Error::Request { source, .. } => Some(source),
            Error::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FailureClass::from_status(500), FailureClass::TransientServer);
        assert_eq!(FailureClass::from_status(503), FailureClass::TransientServer);
        assert_eq!(FailureClass::from_status(429), FailureClass::RateLimited);
        assert_eq!(FailureClass::from_status(404), FailureClass::FatalClient);
        assert_eq!(FailureClass::from_status(401), FailureClass::FatalClient);
        assert_eq!(FailureClass::from_status(302), FailureClass::Unclassified);
    }

    #[test]
    fn test_retryable_classes() {
        assert!(FailureClass::TransientServer.is_retryable());
        assert!(FailureClass::RateLimited.is_retryable());
        assert!(FailureClass::TransientNetwork.is_retryable());
        assert!(!FailureClass::FatalClient.is_retryable());
        assert!(!FailureClass::Unclassified.is_retryable());
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = RemoteRequestError::from_status(502, &body);
        assert!(err.message.len() < 520);
        assert!(err.message.ends_with("..."));
        assert_eq!(err.status, Some(502));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let err = RemoteRequestError::from_status(500, &body);
        assert!(err.message.ends_with("..."));
    }

    #[test]
    fn test_display_includes_status() {
        let err = RemoteRequestError::from_status(404, "no such model");
        assert_eq!(err.to_string(), "fatal-client failure (HTTP 404): no such model");
    }
}
