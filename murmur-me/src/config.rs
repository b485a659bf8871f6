//! Configuration for the avatar link

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// VTube Studio link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Connect to the avatar controller (off by default)
    pub enabled: bool,

    /// WebSocket URL of the controller API
    pub url: String,

    /// Plugin name shown in the controller's permission dialog
    pub plugin_name: String,

    /// Plugin developer shown in the controller's permission dialog
    pub plugin_developer: String,

    /// Parameter receiving the mouth level
    pub parameter: String,

    /// Exponential smoothing factor, in (0, 1]
    pub smoothing: f32,

    pub connect_timeout_ms: u64,

    /// Bound on each handshake response
    pub response_timeout_ms: u64,

    pub ping_timeout_ms: u64,

    /// Levels buffered between the speech pipeline and the link
    pub queue_capacity: usize,

    /// Minimum time between automatic reconnect attempts
    pub reconnect_cooldown_ms: u64,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "ws://127.0.0.1:8001".to_string(),
            plugin_name: "murmur".to_string(),
            plugin_developer: "murmur".to_string(),
            parameter: "MouthOpen".to_string(),
            smoothing: 0.3,
            connect_timeout_ms: 10_000,
            response_timeout_ms: 2_000,
            ping_timeout_ms: 1_000,
            queue_capacity: 32,
            reconnect_cooldown_ms: 5_000,
        }
    }
}

impl AvatarConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.url).map_err(|e| format!("Invalid avatar URL: {}", e))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err("Avatar URL must use ws:// or wss://".to_string());
        }

        if self.plugin_name.len() < 3 || self.plugin_name.len() > 32 {
            return Err("Plugin name must be 3-32 characters".to_string());
        }

        if self.plugin_developer.len() < 3 || self.plugin_developer.len() > 32 {
            return Err("Plugin developer must be 3-32 characters".to_string());
        }

        if self.parameter.is_empty() || self.parameter.len() > 32 {
            return Err("Parameter name must be 1-32 characters".to_string());
        }

        if !self.parameter.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("Parameter name must be alphanumeric".to_string());
        }

        if !self.smoothing.is_finite() || self.smoothing <= 0.0 || self.smoothing > 1.0 {
            return Err("Smoothing must be in (0.0, 1.0]".to_string());
        }

        if self.connect_timeout_ms == 0 || self.response_timeout_ms == 0 || self.ping_timeout_ms == 0 {
            return Err("Avatar timeouts must be greater than 0".to_string());
        }

        if self.queue_capacity == 0 || self.queue_capacity > 4096 {
            return Err("Level queue capacity must be 1-4096".to_string());
        }

        Ok(())
    }
}
