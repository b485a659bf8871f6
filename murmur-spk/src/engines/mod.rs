//! Speech synthesis backends

pub mod api;

use crate::config::SpeechRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use murmur_core::RemoteRequestError;

/// Ordered audio chunks as they arrive from the network
pub type ChunkStream = BoxStream<'static, Result<Bytes, RemoteRequestError>>;

/// Trait for streaming synthesis backends
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Issue one synthesis request and return its body as a chunk stream.
    ///
    /// Only the opening of the stream is a retryable call; errors while
    /// reading the stream are reported through the stream itself.
    async fn open_stream(&self, request: &SpeechRequest) -> Result<ChunkStream, RemoteRequestError>;
}
