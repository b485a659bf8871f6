//! Streaming text-to-speech with live loudness extraction

use crate::config::{SpeechConfig, SpeechRequest};
use crate::engines::SpeechProvider;
use crate::loudness::LoudnessMeter;
use crate::playback::{AudioOutput, PlaybackSink};
use futures_util::StreamExt;
use murmur_core::{CancellationToken, Error, RemoteRequestError, Result, RetryExecutor};
use murmur_me::LevelQueue;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one `speak` call delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeechReport {
    /// Non-empty chunks written to the sink
    pub chunks: usize,
    pub bytes: usize,
    /// Loudness samples handed to the level queue
    pub levels_offered: usize,
}

/// Synthesizes text and plays it while it streams in.
///
/// Every chunk goes to the playback sink in arrival order. In raw PCM mode
/// each chunk also yields one loudness sample, offered to the level queue
/// before the chunk is written; the queue never blocks, so a slow avatar
/// cannot hold back audio.
pub struct StreamingSpeechPipeline {
    config: SpeechConfig,
    provider: Arc<dyn SpeechProvider>,
    executor: RetryExecutor,
}

impl StreamingSpeechPipeline {
    pub fn new(config: SpeechConfig, provider: Arc<dyn SpeechProvider>, executor: RetryExecutor) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        Ok(Self {
            config,
            provider,
            executor,
        })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    pub async fn speak(
        &self,
        text: &str,
        output: &dyn AudioOutput,
        levels: Option<&LevelQueue>,
        cancel: &CancellationToken,
    ) -> Result<SpeechReport> {
        let mut report = SpeechReport::default();
        if text.trim().is_empty() {
            return Ok(report);
        }

        let format = self.config.format;
        let request = SpeechRequest::new(&self.config, text);
        let provider = self.provider.as_ref();
        let request = &request;
        let mut stream = self
            .executor
            .execute("speech synthesis", cancel, move |_| provider.open_stream(request))
            .await?;

        let mut meter = format.is_raw_pcm().then(|| LoudnessMeter::new(self.config.loudness_gain));
        let mut sink: Option<Box<dyn PlaybackSink>> = None;
        let chunk_timeout = self.config.chunk_timeout();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => None,
                next = tokio::time::timeout(chunk_timeout, stream.next()) => Some(next),
            };

            let chunk = match next {
                None => return Err(abort(sink, Error::Cancelled).await),
                Some(Err(_)) => {
                    let source = RemoteRequestError::transient_network(format!(
                        "no audio received for {:?}",
                        chunk_timeout
                    ));
                    return Err(abort(sink, stream_error(source)).await);
                }
                Some(Ok(None)) => break,
                Some(Ok(Some(Err(e)))) => return Err(abort(sink, stream_error(e)).await),
                Some(Ok(Some(Ok(chunk)))) => chunk,
            };
            if chunk.is_empty() {
                continue;
            }

            if let (Some(meter), Some(queue)) = (meter.as_mut(), levels) {
                queue.offer(meter.measure(&chunk));
                report.levels_offered += 1;
            }

            let active = match sink.as_mut() {
                Some(active) => active,
                None => {
                    debug!("Opening {} for {} playback", output.name(), format);
                    sink.insert(output.open(format)?)
                }
            };

            let len = chunk.len();
            let written = tokio::select! {
                _ = cancel.cancelled() => None,
                result = active.write(chunk) => Some(result),
            };
            match written {
                None => return Err(abort(sink, Error::Cancelled).await),
                Some(Err(e)) => return Err(abort(sink, e).await),
                Some(Ok(())) => {}
            }

            report.chunks += 1;
            report.bytes += len;
        }

        let Some(active) = sink else {
            debug!("Synthesis returned no audio");
            return Ok(report);
        };

        // dropping an unfinished sink stops the player
        let finished = tokio::select! {
            _ = cancel.cancelled() => None,
            result = active.finish() => Some(result),
        };
        match finished {
            None => Err(Error::Cancelled),
            Some(result) => {
                result?;
                debug!(
                    "Played {} chunks ({} bytes), {} levels offered",
                    report.chunks, report.bytes, report.levels_offered
                );
                Ok(report)
            }
        }
    }
}

fn stream_error(source: RemoteRequestError) -> Error {
    Error::Request {
        operation: "speech stream".to_string(),
        source,
    }
}

/// Stop playback and pass `err` through
async fn abort(sink: Option<Box<dyn PlaybackSink>>, err: Error) -> Error {
    if let Some(sink) = sink {
        if !err.is_cancelled() {
            warn!("Stopping playback: {}", err);
        }
        sink.abort().await;
    }
    err
}
