// murmur: talk to a language model, hear it answer, and move an avatar's mouth

mod console;
mod settings;

use anyhow::{anyhow, Context};
use clap::Parser;
use console::VoiceConsole;
use murmur_core::{RetryExecutor, API_KEY_ENV};
use murmur_llm::{ConversationSession, OpenAiChatProvider};
use murmur_me::{AvatarConfig, AvatarLinkClient, LevelForwarder};
use murmur_spk::{default_outputs, select_output, AudioFormat, OpenAiSpeechProvider, StreamingSpeechPipeline};
use settings::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(about = "Voice chat with a language model, with optional VTube Studio lip sync", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Speech voice
    #[arg(long)]
    voice: Option<String>,

    /// API key, overriding OPENAI_API_KEY
    #[arg(long)]
    token: Option<String>,

    /// Store --token in ./.env for later runs
    #[arg(long, requires = "token")]
    save_token: bool,

    /// System prompt for the conversation
    #[arg(long)]
    system: Option<String>,

    /// Connect to VTube Studio
    #[arg(short = 'v', long = "vtube", overrides_with = "no_vtube")]
    vtube: bool,

    /// Do not connect to VTube Studio
    #[arg(long = "no-vtube", overrides_with = "vtube")]
    no_vtube: bool,

    /// Stream mouth levels while speaking (forces raw PCM audio)
    #[arg(long)]
    lipstream: bool,

    /// Audio format requested from the speech API (mp3, opus, aac, flac, wav, pcm)
    #[arg(long)]
    format: Option<AudioFormat>,

    /// Configuration file (defaults to ./murmur.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Chat model
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,
}

impl Cli {
    /// Command-line flags win over file and environment settings
    fn apply(&self, config: &mut AppConfig) {
        if let Some(voice) = &self.voice {
            config.speech.voice = voice.clone();
        }
        if let Some(system) = &self.system {
            config.conversation.system_prompt = Some(system.clone());
        }
        if let Some(format) = self.format {
            config.speech.format = format;
        }
        if let Some(model) = &self.model {
            config.conversation.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if self.vtube {
            config.avatar.enabled = true;
        }
        if self.no_vtube {
            config.avatar.enabled = false;
        }
        if self.lipstream {
            config.lipstream = true;
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug,hyper=info,reqwest=info,tungstenite=info,tokio_tungstenite=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,murmur=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env: {}", e);
        }
    }

    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load_default()?,
    };
    config.apply_env();
    cli.apply(&mut config);
    config.normalize();
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    if cli.save_token {
        if let Some(token) = &cli.token {
            settings::save_token(Path::new(".env"), token).context("Failed to save the API key to .env")?;
            info!("API key saved to .env");
        }
    }

    let api_key = cli.token.clone().or_else(|| std::env::var(API_KEY_ENV).ok());
    let api = config
        .api_config(api_key)
        .with_context(|| format!("Set {} or pass --token", API_KEY_ENV))?;

    let executor = RetryExecutor::new(api.retry.clone())?;
    let chat = OpenAiChatProvider::new(api.clone())?;
    let session = ConversationSession::new(config.conversation.clone(), Arc::new(chat), executor.clone())?;

    let speech = OpenAiSpeechProvider::new(api)?;
    let pipeline = StreamingSpeechPipeline::new(config.speech.clone(), Arc::new(speech), executor)?;
    let output = select_output(default_outputs(), config.speech.format)?;

    let forwarder = if config.avatar.enabled {
        if !config.speech.format.is_raw_pcm() {
            warn!("Mouth levels need raw PCM audio; use --lipstream or --format pcm");
        }
        start_lip_sync(config.avatar.clone()).await
    } else {
        None
    };

    let mut console = VoiceConsole::new(session, pipeline, output, forwarder);
    console.run().await
}

/// Connect to VTube Studio. Any failure only disables lip sync.
async fn start_lip_sync(avatar: AvatarConfig) -> Option<LevelForwarder> {
    let mut client = match AvatarLinkClient::new(avatar) {
        Ok(client) => client,
        Err(e) => {
            warn!("VTube Studio settings rejected, lip sync disabled: {}", e);
            return None;
        }
    };

    if let Err(e) = client.connect().await {
        warn!("VTube Studio not reachable, lip sync disabled: {}", e);
        return None;
    }
    if !client.check_connection().await {
        warn!("VTube Studio did not answer a ping, lip sync disabled");
        client.close().await;
        return None;
    }

    info!("Lip sync enabled");
    Some(LevelForwarder::spawn(client))
}
