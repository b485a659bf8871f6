//! Classification-aware retry executor for outbound calls

use crate::config::RetryConfig;
use crate::error::{Error, FailureClass, RemoteRequestError, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(FailureClass),
}

/// Diagnostic record of one attempt within a logical call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Wall time spent in the call itself
    pub elapsed: Duration,
    /// Wait scheduled before the next attempt, if one follows
    pub backoff: Option<Duration>,
}

/// Callback receiving every attempt record
pub type AttemptObserver = Arc<dyn Fn(&RetryAttempt) + Send + Sync>;

/// Runs one logical remote operation under the retry policy.
///
/// Holds only configuration; every call to [`RetryExecutor::execute`] starts
/// from attempt 1 with no state carried over from previous calls.
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    observer: Option<AttemptObserver>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        Ok(Self {
            config,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `op` until it succeeds, fails fatally, exhausts the attempt
    /// budget, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number and must perform exactly one
    /// network call.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteRequestError>>,
    {
        let max_attempts = self.config.max_attempts;
        let mut last_error: Option<RemoteRequestError> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let started = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = op(attempt) => result,
            };
            let elapsed = started.elapsed();

            let err = match result {
                Ok(value) => {
                    debug!("{} succeeded on attempt {} in {:.2?}", operation, attempt, elapsed);
                    self.observe(RetryAttempt {
                        attempt,
                        outcome: AttemptOutcome::Success,
                        elapsed,
                        backoff: None,
                    });
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!("{} failed on attempt {} ({}), not retrying", operation, attempt, err);
                self.observe(RetryAttempt {
                    attempt,
                    outcome: AttemptOutcome::Failed(err.class),
                    elapsed,
                    backoff: None,
                });
                return Err(Error::Request {
                    operation: operation.to_string(),
                    source: err,
                });
            }

            let backoff = if attempt < max_attempts {
                Some(self.delay_for(err.class, attempt))
            } else {
                None
            };

            self.observe(RetryAttempt {
                attempt,
                outcome: AttemptOutcome::Failed(err.class),
                elapsed,
                backoff,
            });

            if let Some(delay) = backoff {
                match err.class {
                    FailureClass::RateLimited => {
                        warn!("{} rate limited, waiting {:.2?} (attempt {}/{})", operation, delay, attempt, max_attempts)
                    }
                    _ => warn!("{}: {}, retry in {:.2?} (attempt {}/{})", operation, err, delay, attempt, max_attempts),
                }

                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            last_error = Some(err);
        }

        let last = last_error
            .unwrap_or_else(|| RemoteRequestError::unclassified("no attempt was made"));
        warn!("{} giving up after {} attempts", operation, max_attempts);
        Err(Error::RetriesExhausted {
            operation: operation.to_string(),
            attempts: max_attempts,
            last,
        })
    }

    fn delay_for(&self, class: FailureClass, attempt: u32) -> Duration {
        match class {
            FailureClass::RateLimited => self.config.rate_limit_delay(),
            _ => self.config.backoff_after(attempt),
        }
    }

    fn observe(&self, record: RetryAttempt) {
        if let Some(observer) = &self.observer {
            observer(&record);
        }
    }
}
