use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_history_limit() -> usize {
    40
}

/// Conversation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Chat model name
    pub model: String,

    /// Leading system prompt (empty means none)
    pub system_prompt: Option<String>,

    /// Maximum number of turns kept and submitted, system turn included
    pub history_limit: usize,

    /// Sampling temperature passed through when set
    pub temperature: Option<f32>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: None,
            history_limit: default_history_limit(),
            temperature: None,
        }
    }
}

impl ConversationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if self.model.len() > 256 || self.model.chars().any(|c| c.is_control()) {
            return Err("Model name is invalid".to_string());
        }

        if self.history_limit == 0 {
            return Err("History limit must be at least 1".to_string());
        }

        let has_prompt = self.system_prompt.as_deref().is_some_and(|p| !p.trim().is_empty());
        if has_prompt && self.history_limit < 2 {
            return Err("History limit must be at least 2 when a system prompt is set".to_string());
        }

        if let Some(temperature) = self.temperature {
            if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
