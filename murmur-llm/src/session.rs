//! Bounded conversation history in front of a chat provider

use crate::config::{ChatRequest, ConversationConfig, Role, Turn};
use crate::providers::{parse_chat_response, ChatProvider};
use murmur_core::{CancellationToken, Error, Result, RetryExecutor};
use std::sync::Arc;
use tracing::{debug, info};

/// A conversation with a remote chat model.
///
/// History holds at most one leading system turn. When it grows past the
/// configured limit the system turn is kept and the oldest other turns are
/// dropped first. The same rule shapes every submitted request.
pub struct ConversationSession {
    config: ConversationConfig,
    provider: Arc<dyn ChatProvider>,
    executor: RetryExecutor,
    history: Vec<Turn>,
}

impl ConversationSession {
    pub fn new(
        config: ConversationConfig,
        provider: Arc<dyn ChatProvider>,
        executor: RetryExecutor,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let mut session = Self {
            config,
            provider,
            executor,
            history: Vec::new(),
        };
        let prompt = session.config.system_prompt.clone();
        session.set_system_prompt(prompt)?;
        Ok(session)
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Send `text` as the next user turn and return the model's reply.
    ///
    /// A failed ask leaves the history exactly as it was before the call.
    pub async fn ask(&mut self, text: &str, cancel: &CancellationToken) -> Result<String> {
        self.history.push(Turn::user(text));

        match self.complete(cancel).await {
            Ok(reply) => {
                self.history.push(Turn::assistant(reply.clone()));
                trim_turns(&mut self.history, self.config.history_limit);
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    async fn complete(&self, cancel: &CancellationToken) -> Result<String> {
        let mut messages = self.history.clone();
        trim_turns(&mut messages, self.config.history_limit);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        };
        debug!(
            "Submitting {} of {} turns to {}",
            request.messages.len(),
            self.history.len(),
            self.provider.name()
        );

        let provider = self.provider.as_ref();
        let request = &request;
        let body = self
            .executor
            .execute("chat completion", cancel, move |_| provider.complete(request))
            .await?;

        let response = parse_chat_response(&body)?;
        if let Some(usage) = &response.usage {
            debug!(
                "Token usage: prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        Ok(response.content.trim().to_string())
    }

    /// Drop everything except the system turn
    pub fn reset(&mut self) {
        self.history.retain(|turn| turn.role == Role::System);
        info!("Conversation history cleared");
    }

    /// Replace, add or remove the leading system turn.
    ///
    /// A prompt needs room for at least one user turn next to it, so it is
    /// rejected when the history limit is 1.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) -> Result<()> {
        let prompt = prompt.filter(|p| !p.trim().is_empty());
        if prompt.is_some() && self.config.history_limit < 2 {
            return Err(Error::Config(
                "History limit must be at least 2 when a system prompt is set".to_string(),
            ));
        }
        let has_system = self.history.first().map(|t| t.role == Role::System).unwrap_or(false);

        match (prompt, has_system) {
            (Some(prompt), true) => self.history[0].content = prompt,
            (Some(prompt), false) => self.history.insert(0, Turn::system(prompt)),
            (None, true) => {
                self.history.remove(0);
            }
            (None, false) => {}
        }
        self.config.system_prompt = self
            .history
            .first()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.clone());
        trim_turns(&mut self.history, self.config.history_limit);
        Ok(())
    }
}

/// Bound `turns` to `limit` entries, keeping a leading system turn
pub fn trim_turns(turns: &mut Vec<Turn>, limit: usize) {
    if turns.len() <= limit {
        return;
    }

    let has_system = turns.first().map(|t| t.role == Role::System).unwrap_or(false);
    if has_system {
        let keep = limit.saturating_sub(1);
        let start = turns.len() - keep;
        turns.drain(1..start);
    } else {
        let start = turns.len() - limit;
        turns.drain(..start);
    }
}
