use async_trait::async_trait;
use crate::config::{ChatRequest, ChatResponse, Usage};
use crate::providers::trait_impl::ChatProvider;
use murmur_core::{ApiConfig, Error, RemoteRequestError, Result};
use reqwest::Client;
use serde_json::Value;

/// Chat completions against an OpenAI-compatible endpoint
pub struct OpenAiChatProvider {
    config: ApiConfig,
    client: Client,
}

impl OpenAiChatProvider {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> std::result::Result<String, RemoteRequestError> {
        tracing::debug!(
            "Chat request to {} with key {}... ({} messages)",
            self.config.base_url,
            self.config.key_hint(),
            request.messages.len()
        );

        let response = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .header("Authorization", self.config.bearer())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteRequestError::from_status(status.as_u16(), &text));
        }

        Ok(response.text().await?)
    }
}

/// Extract the reply from an OpenAI-style chat completion body
pub fn parse_chat_response(body: &str) -> Result<ChatResponse> {
    let body: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("chat response is not JSON: {}", e)))?;

    let choices = body
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| Error::MalformedResponse("no choices array in chat response".to_string()))?;

    let choice = choices
        .first()
        .ok_or_else(|| Error::MalformedResponse("empty choices array in chat response".to_string()))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| Error::MalformedResponse("choice has no message content".to_string()))?;

    let usage = body.get("usage").and_then(|u| {
        Some(Usage {
            prompt_tokens: u.get("prompt_tokens")?.as_u64()? as u32,
            completion_tokens: u.get("completion_tokens")?.as_u64()? as u32,
            total_tokens: u.get("total_tokens").and_then(|t| t.as_u64()).unwrap_or(0) as u32,
        })
    });

    Ok(ChatResponse {
        content: content.to_string(),
        model: body.get("model").and_then(|m| m.as_str()).map(|s| s.to_string()),
        usage,
        finish_reason: choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_response() {
        let body = json!({
            "model": "gpt-4.1",
            "choices": [{"message": {"role": "assistant", "content": "  Hello!  "}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let parsed = parse_chat_response(&body.to_string()).unwrap();
        assert_eq!(parsed.content, "  Hello!  ");
        assert_eq!(parsed.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(parsed.finish_reason.as_deref(), Some("stop"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_without_usage() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        let parsed = parse_chat_response(&body.to_string()).unwrap();
        assert_eq!(parsed.content, "hi");
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_parse_empty_choices_is_malformed() {
        let body = json!({"choices": []});
        assert!(matches!(parse_chat_response(&body.to_string()), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_missing_choices_is_malformed() {
        let body = json!({"error": "oops"});
        assert!(matches!(parse_chat_response(&body.to_string()), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_missing_content_is_malformed() {
        let body = json!({"choices": [{"message": {"role": "assistant"}}]});
        assert!(matches!(parse_chat_response(&body.to_string()), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_non_json_body_is_malformed() {
        let body = "<html><body>502 Bad Gateway</body></html>";
        match parse_chat_response(body) {
            Err(Error::MalformedResponse(msg)) => assert!(msg.contains("not JSON")),
            other => panic!("expected malformed response, got {:?}", other.map(|r| r.content)),
        }
    }

    #[test]
    fn test_request_serialises_lowercase_roles() {
        let request = ChatRequest {
            model: "gpt-4.1".to_string(),
            messages: vec![crate::Turn::system("be brief"), crate::Turn::user("hi")],
            temperature: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("temperature").is_none());
    }
}
