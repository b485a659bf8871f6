//! Configuration for speech synthesis

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Sample rate of raw PCM synthesis output
pub const PCM_SAMPLE_RATE: u32 = 24_000;

/// Raw PCM output is mono
pub const PCM_CHANNELS: u16 = 1;

/// Encoding of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    /// s16le mono at [`PCM_SAMPLE_RATE`]
    Pcm,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Mp3,
        AudioFormat::Opus,
        AudioFormat::Aac,
        AudioFormat::Flac,
        AudioFormat::Wav,
        AudioFormat::Pcm,
    ];

    /// Wire name used by the synthesis endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    pub fn is_raw_pcm(&self) -> bool {
        matches!(self, AudioFormat::Pcm)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        AudioFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| format!("Unknown audio format '{}' (expected mp3, opus, aac, flac, wav or pcm)", s))
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Synthesis model
    pub model: String,

    /// Voice name
    pub voice: String,

    /// Output encoding
    pub format: AudioFormat,

    /// Multiplier applied to loudness before clamping (0.0-10.0, default 1.0)
    pub loudness_gain: f32,

    /// Longest silence tolerated between two chunks of one stream
    pub chunk_timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "tts-1-hd".to_string(),
            voice: "alloy".to_string(),
            format: AudioFormat::Mp3,
            loudness_gain: 1.0,
            chunk_timeout_secs: 30,
        }
    }
}

impl SpeechConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() || self.model.len() > 256 {
            return Err("Speech model must be 1-256 characters".to_string());
        }

        if self.voice.is_empty() || self.voice.len() > 64 {
            return Err("Voice must be 1-64 characters".to_string());
        }

        if self.voice.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err("Voice contains invalid characters".to_string());
        }

        if !self.loudness_gain.is_finite() || !(0.0..=10.0).contains(&self.loudness_gain) {
            return Err("Loudness gain must be between 0.0 and 10.0".to_string());
        }

        if self.chunk_timeout_secs == 0 || self.chunk_timeout_secs > 300 {
            return Err("Chunk timeout must be 1-300 seconds".to_string());
        }

        Ok(())
    }
}

/// Body of a streaming synthesis request
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: String,
    pub input: String,
    pub response_format: AudioFormat,
    pub stream: bool,
}

impl SpeechRequest {
    pub fn new(config: &SpeechConfig, text: &str) -> Self {
        Self {
            model: config.model.clone(),
            voice: config.voice.clone(),
            input: text.to_string(),
            response_format: config.format,
            stream: true,
        }
    }
}
