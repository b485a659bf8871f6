//! OpenAI-compatible streaming speech endpoint

use crate::config::SpeechRequest;
use crate::engines::{ChunkStream, SpeechProvider};
use async_trait::async_trait;
use futures_util::StreamExt;
use murmur_core::{ApiConfig, Error, RemoteRequestError, Result};
use reqwest::Client;
use tracing::debug;

pub struct OpenAiSpeechProvider {
    config: ApiConfig,
    client: Client,
}

impl OpenAiSpeechProvider {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeechProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn open_stream(&self, request: &SpeechRequest) -> std::result::Result<ChunkStream, RemoteRequestError> {
        debug!(
            "Speech request: model={} voice={} format={} ({} chars)",
            request.model,
            request.voice,
            request.response_format,
            request.input.chars().count()
        );

        let send = self
            .client
            .post(self.config.endpoint("audio/speech"))
            .header("Authorization", self.config.bearer())
            .json(request)
            .send();

        // only the wait for headers is bounded; the body streams as long as it takes
        let wait = self.config.timeout();
        let response = tokio::time::timeout(wait, send)
            .await
            .map_err(|_| RemoteRequestError::transient_network(format!("no response headers within {:?}", wait)))??;

        let status = response.status();
        if !status.is_success() {
            let text = tokio::time::timeout(wait, response.text())
                .await
                .ok()
                .and_then(|text| text.ok())
                .unwrap_or_default();
            return Err(RemoteRequestError::from_status(status.as_u16(), &text));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(RemoteRequestError::from));
        Ok(stream.boxed())
    }
}
