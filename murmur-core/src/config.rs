//! Configuration for remote API access and retry policy

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the bearer token
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Remote API access settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(skip_serializing, default)]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry policy applied to every outbound call
    #[serde(default)]
    pub retry: RetryConfig,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ApiConfig {
    /// Create an API configuration.
    ///
    /// A missing or blank credential is a configuration error, never something
    /// to retry at request time.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", API_KEY_ENV)))?;

        let config = Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        };
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    /// Credential from the environment, endpoint from the default
    pub fn from_env() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, std::env::var(API_KEY_ENV).ok())
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// First characters of the key, for logs
    pub fn key_hint(&self) -> &str {
        if self.api_key.len() > 8 && self.api_key.is_char_boundary(8) {
            &self.api_key[..8]
        } else {
            "***"
        }
    }

    /// HTTP client honouring the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.api_key.is_empty() {
            return Err(format!("{} is not set", API_KEY_ENV));
        }

        if self.api_key.chars().any(|c| c.is_control()) {
            return Err("API key contains invalid characters".to_string());
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err("Base URL must use http:// or https://".to_string());
        }

        if self.base_url.len() > 2048 {
            return Err("Base URL too long (max 2048 chars)".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("API timeout must be greater than 0".to_string());
        }

        if self.timeout_secs > 300 {
            return Err("API timeout too large (max 300 seconds)".to_string());
        }

        self.retry.validate()
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first one
    pub max_attempts: u32,

    /// Exponential base for transient failures
    pub backoff_base: f64,

    /// Length of one backoff unit in milliseconds
    pub backoff_unit_ms: u64,

    /// Fixed wait after a 429 response in milliseconds
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
            backoff_unit_ms: 1000,
            rate_limit_delay_ms: 20_000,
        }
    }
}

impl RetryConfig {
    /// Wait inserted after failed attempt `attempt` (1-based) for transient failures
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let units = self.backoff_base.powi(attempt as i32);
        let millis = units * self.backoff_unit_ms as f64;
        if millis.is_finite() && millis < u64::MAX as f64 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::from_millis(u64::MAX)
        }
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Validate retry configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.max_attempts > 100 {
            return Err("Max attempts too large (max 100)".to_string());
        }

        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err("Backoff base must be a finite number >= 1.0".to_string());
        }

        if self.backoff_unit_ms > 60_000 {
            return Err("Backoff unit too large (max 60000 ms)".to_string());
        }

        if self.rate_limit_delay_ms > 300_000 {
            return Err("Rate limit delay too large (max 300000 ms)".to_string());
        }

        Ok(())
    }
}
