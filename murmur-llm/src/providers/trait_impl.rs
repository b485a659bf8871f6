use async_trait::async_trait;
use crate::config::ChatRequest;
use murmur_core::RemoteRequestError;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Perform exactly one chat completion call and return the raw response body
    async fn complete(&self, request: &ChatRequest) -> Result<String, RemoteRequestError>;
}
