//! Local audio outputs fed from a chunk stream

use crate::config::{AudioFormat, PCM_CHANNELS, PCM_SAMPLE_RATE};
use async_trait::async_trait;
use bytes::Bytes;
use murmur_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

/// An open playback session for one utterance
#[async_trait]
pub trait PlaybackSink: Send {
    /// Write the next chunk, waiting while the player catches up
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Signal end of input and wait for playback to complete
    async fn finish(self: Box<Self>) -> Result<()>;

    /// Stop playback immediately
    async fn abort(self: Box<Self>);
}

/// A way of playing audio on this machine
pub trait AudioOutput: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the output can be used at all
    fn is_available(&self) -> bool;

    fn supports(&self, format: AudioFormat) -> bool;

    /// Start a playback session for `format`
    fn open(&self, format: AudioFormat) -> Result<Box<dyn PlaybackSink>>;
}

/// Command-line players that read audio from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player {
    Ffplay,
    Mpv,
    Aplay,
    Mpg123,
}

impl Player {
    /// Probe order when choosing a default output
    pub const PREFERENCE: [Player; 4] = [Player::Ffplay, Player::Mpv, Player::Aplay, Player::Mpg123];

    pub fn program(&self) -> &'static str {
        match self {
            Player::Ffplay => "ffplay",
            Player::Mpv => "mpv",
            Player::Aplay => "aplay",
            Player::Mpg123 => "mpg123",
        }
    }

    pub fn supports(&self, format: AudioFormat) -> bool {
        match self {
            Player::Ffplay | Player::Mpv => true,
            Player::Aplay => matches!(format, AudioFormat::Pcm | AudioFormat::Wav),
            Player::Mpg123 => format == AudioFormat::Mp3,
        }
    }

    /// Arguments making the player read `format` from stdin
    pub fn args(&self, format: AudioFormat) -> Vec<String> {
        let rate = PCM_SAMPLE_RATE.to_string();
        let channels = PCM_CHANNELS.to_string();
        let args: Vec<&str> = match (self, format) {
            (Player::Ffplay, AudioFormat::Pcm) => vec![
                "-autoexit", "-nodisp", "-loglevel", "quiet", "-f", "s16le", "-ar", rate.as_str(), "-ac", channels.as_str(), "-",
            ],
            (Player::Ffplay, _) => vec!["-autoexit", "-nodisp", "-loglevel", "quiet", "-"],
            (Player::Mpv, AudioFormat::Pcm) => {
                return vec![
                    "--no-video".to_string(),
                    "--really-quiet".to_string(),
                    "--demuxer=rawaudio".to_string(),
                    "--demuxer-rawaudio-format=s16le".to_string(),
                    format!("--demuxer-rawaudio-rate={}", rate),
                    format!("--demuxer-rawaudio-channels={}", channels),
                    "-".to_string(),
                ]
            }
            (Player::Mpv, _) => vec!["--no-video", "--really-quiet", "-"],
            (Player::Aplay, AudioFormat::Pcm) => {
                vec!["-q", "-t", "raw", "-f", "S16_LE", "-r", rate.as_str(), "-c", channels.as_str(), "-"]
            }
            (Player::Aplay, _) => vec!["-q", "-t", "wav", "-"],
            (Player::Mpg123, _) => vec!["-q", "-"],
        };
        args.into_iter().map(String::from).collect()
    }
}

/// Find an executable on PATH
pub fn locate(program: &str) -> Option<PathBuf> {
    let output = StdCommand::new("which")
        .arg(program)
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Subprocess player, looked up once on construction
#[derive(Debug, Clone)]
pub struct CommandOutput {
    player: Player,
    path: Option<PathBuf>,
}

impl CommandOutput {
    pub fn detect(player: Player) -> Self {
        let path = locate(player.program());
        debug!("Probed {}: {:?}", player.program(), path);
        Self { player, path }
    }

    pub fn player(&self) -> Player {
        self.player
    }
}

impl AudioOutput for CommandOutput {
    fn name(&self) -> &str {
        self.player.program()
    }

    fn is_available(&self) -> bool {
        self.path.is_some()
    }

    fn supports(&self, format: AudioFormat) -> bool {
        self.player.supports(format)
    }

    fn open(&self, format: AudioFormat) -> Result<Box<dyn PlaybackSink>> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Playback(format!("{} is not installed", self.player.program())))?;
        let sink = CommandSink::spawn(path, &self.player.args(format))?;
        Ok(Box::new(sink))
    }
}

/// Child process receiving audio on stdin
pub struct CommandSink {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl CommandSink {
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let name = program.display().to_string();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Playback(format!("Failed to start {}: {}", name, e)))?;

        let stdin = child.stdin.take();
        debug!("Started player {}", name);
        Ok(Self {
            program: name,
            child,
            stdin,
        })
    }
}

#[async_trait]
impl PlaybackSink for CommandSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Playback(format!("{} input already closed", self.program)))?;
        stdin
            .write_all(&chunk)
            .await
            .map_err(|e| Error::Playback(format!("{} stopped accepting audio: {}", self.program, e)))
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        let mut this = self;
        if let Some(mut stdin) = this.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("Closing {} input: {}", this.program, e);
            }
        }

        let status = this
            .child
            .wait()
            .await
            .map_err(|e| Error::Playback(format!("Waiting for {}: {}", this.program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Playback(format!("{} exited with {}", this.program, status)))
        }
    }

    async fn abort(self: Box<Self>) {
        let mut this = self;
        this.stdin.take();
        if let Err(e) = this.child.kill().await {
            warn!("Failed to stop {}: {}", this.program, e);
        }
    }
}

/// Every known player, detected in preference order
pub fn default_outputs() -> Vec<Box<dyn AudioOutput>> {
    Player::PREFERENCE
        .into_iter()
        .map(|player| Box::new(CommandOutput::detect(player)) as Box<dyn AudioOutput>)
        .collect()
}

/// Bind to the first available output able to play `format`
pub fn select_output(candidates: Vec<Box<dyn AudioOutput>>, format: AudioFormat) -> Result<Box<dyn AudioOutput>> {
    let names: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
    let selected = candidates
        .into_iter()
        .find(|candidate| candidate.is_available() && candidate.supports(format));

    match selected {
        Some(output) => {
            info!("Audio output: {} ({})", output.name(), format);
            Ok(output)
        }
        None => Err(Error::Config(format!(
            "No audio output available for {} (tried: {}). Install ffmpeg (ffplay) or mpv",
            format,
            names.join(", ")
        ))),
    }
}
