//! murmur-spk: streaming speech output
//!
//! Provides:
//! - An OpenAI-compatible streaming synthesis backend
//! - Loudness extraction from raw PCM chunks
//! - Subprocess audio players detected at startup
//! - A pipeline playing audio as it arrives while feeding mouth levels to the avatar

pub mod config;
pub mod engines;
pub mod loudness;
pub mod pipeline;
pub mod playback;

pub use config::{AudioFormat, SpeechConfig, SpeechRequest, PCM_CHANNELS, PCM_SAMPLE_RATE};
pub use engines::api::OpenAiSpeechProvider;
pub use engines::{ChunkStream, SpeechProvider};
pub use loudness::{rms_level, LoudnessMeter};
pub use pipeline::{SpeechReport, StreamingSpeechPipeline};
pub use playback::{default_outputs, select_output, AudioOutput, CommandOutput, CommandSink, PlaybackSink, Player};
