//! murmur-core: shared foundation for the murmur voice assistant
//!
//! Provides:
//! - The error taxonomy used across all crates
//! - Remote API and retry configuration
//! - A classification-aware retry executor for outbound calls

pub mod config;
pub mod error;
pub mod retry;

pub use config::{ApiConfig, RetryConfig, API_KEY_ENV, DEFAULT_BASE_URL};
pub use error::{Error, FailureClass, RemoteRequestError, Result};
pub use retry::{AttemptObserver, AttemptOutcome, RetryAttempt, RetryExecutor};
pub use tokio_util::sync::CancellationToken;
