//! Application settings: TOML file, environment overlay and `.env` handling

use murmur_core::{ApiConfig, Error, RetryConfig, API_KEY_ENV, DEFAULT_BASE_URL};
use murmur_llm::ConversationConfig;
use murmur_me::AvatarConfig;
use murmur_spk::{AudioFormat, SpeechConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// File read from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "murmur.toml";

/// Remote API section; the key itself never lives in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSection,
    pub conversation: ConversationConfig,
    pub speech: SpeechConfig,
    pub avatar: AvatarConfig,

    /// Stream mouth levels to the avatar while speaking
    pub lipstream: bool,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// `murmur.toml` from the working directory when present, defaults otherwise
    pub fn load_default() -> Result<Self, Error> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay `MURMUR_*` variables from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("MURMUR_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Some(model) = lookup("MURMUR_MODEL") {
            self.conversation.model = model;
        }

        if let Some(prompt) = lookup("MURMUR_SYSTEM_PROMPT") {
            self.conversation.system_prompt = Some(prompt);
        }

        if let Some(voice) = lookup("MURMUR_VOICE") {
            self.speech.voice = voice;
        }

        if let Some(format) = lookup("MURMUR_FORMAT").and_then(|f| f.parse::<AudioFormat>().ok()) {
            self.speech.format = format;
        }

        if let Some(enabled) = lookup("MURMUR_VTUBE").and_then(|v| parse_bool(&v)) {
            self.avatar.enabled = enabled;
        }

        if let Some(url) = lookup("MURMUR_VTUBE_URL") {
            self.avatar.url = url;
        }

        if let Some(lipstream) = lookup("MURMUR_LIPSTREAM").and_then(|v| parse_bool(&v)) {
            self.lipstream = lipstream;
        }
    }

    /// Mouth levels are derived from raw PCM, so lip streaming implies both
    pub fn normalize(&mut self) {
        if self.lipstream {
            self.avatar.enabled = true;
            self.speech.format = AudioFormat::Pcm;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.api.retry.validate()?;
        self.conversation.validate()?;
        self.speech.validate()?;
        if self.avatar.enabled {
            self.avatar.validate()?;
        }
        Ok(())
    }

    /// Remote API settings for the given credential
    pub fn api_config(&self, api_key: Option<String>) -> Result<ApiConfig, Error> {
        let config = ApiConfig::new(self.api.base_url.clone(), api_key)?
            .with_timeout_secs(self.api.timeout_secs)
            .with_retry(self.api.retry.clone());
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Insert or replace the API key line of a `.env` file.
///
/// The key is written single-quoted, which `.env` readers take literally, so
/// keys containing quotes, backslashes or whitespace are refused.
pub fn save_token(path: &Path, token: &str) -> io::Result<()> {
    let unquotable = |c: char| c.is_whitespace() || c.is_control() || matches!(c, '\'' | '"' | '\\');
    if token.is_empty() || token.chars().any(unquotable) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "API key must be non-empty and free of quotes, backslashes and whitespace",
        ));
    }

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let entry = format!("{}='{}'", API_KEY_ENV, token);
    let mut replaced = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let key = line.trim_start().trim_start_matches("export ").split('=').next().unwrap_or("").trim();
            if key == API_KEY_ENV && !replaced {
                replaced = true;
                entry.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(entry);
    }

    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content)
}
