// Interactive voice console: read a line, ask the model, speak the answer

use anyhow::Result;
use murmur_core::{CancellationToken, Error};
use murmur_llm::ConversationSession;
use murmur_me::LevelForwarder;
use murmur_spk::{AudioOutput, StreamingSpeechPipeline};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Empty,
    Exit,
    Help,
    Reset,
    System(Option<String>),
    Say(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }

        let lower = line.to_lowercase();
        match lower.as_str() {
            "/exit" | "q" | "quit" => return ConsoleCommand::Exit,
            "/help" | "?" => return ConsoleCommand::Help,
            "/reset" => return ConsoleCommand::Reset,
            _ => {}
        }

        if lower == "/system" || lower.starts_with("/system ") {
            let prompt = line["/system".len()..].trim();
            let prompt = (!prompt.is_empty()).then(|| prompt.to_string());
            return ConsoleCommand::System(prompt);
        }

        ConsoleCommand::Say(line.to_string())
    }
}

pub struct VoiceConsole {
    session: ConversationSession,
    pipeline: StreamingSpeechPipeline,
    output: Box<dyn AudioOutput>,
    forwarder: Option<LevelForwarder>,
}

impl VoiceConsole {
    pub fn new(
        session: ConversationSession,
        pipeline: StreamingSpeechPipeline,
        output: Box<dyn AudioOutput>,
        forwarder: Option<LevelForwarder>,
    ) -> Self {
        Self {
            session,
            pipeline,
            output,
            forwarder,
        }
    }

    /// Run until the user exits, stdin closes or Ctrl-C arrives at the prompt
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    None
                }
            };
            let Some(line) = line else {
                break;
            };

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Empty => continue,
                ConsoleCommand::Exit => break,
                ConsoleCommand::Help => self.print_help(),
                ConsoleCommand::Reset => {
                    self.session.reset();
                    println!("Conversation cleared.");
                }
                ConsoleCommand::System(prompt) => {
                    let cleared = prompt.is_none();
                    match self.session.set_system_prompt(prompt) {
                        Ok(()) if cleared => println!("System prompt removed."),
                        Ok(()) => println!("System prompt set."),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                ConsoleCommand::Say(text) => self.turn(&text).await,
            }
        }

        if let Some(forwarder) = self.forwarder.take() {
            forwarder.shutdown().await;
        }
        println!("Goodbye!");
        Ok(())
    }

    /// One exchange. Ctrl-C cancels it and returns to the prompt.
    async fn turn(&mut self, text: &str) {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self.converse(text, &cancel).await;
        interrupt.abort();

        match result {
            Ok(()) => {}
            Err(Error::Cancelled) => println!("(interrupted)"),
            Err(e) => {
                error!("{}", e);
                println!("Error: {}", e);
            }
        }
    }

    async fn converse(&mut self, text: &str, cancel: &CancellationToken) -> Result<(), Error> {
        let reply = self.session.ask(text, cancel).await?;
        println!("{}", reply);

        let levels = self.forwarder.as_ref().map(|f| f.queue());
        let report = self.pipeline.speak(&reply, self.output.as_ref(), levels, cancel).await?;
        debug!("Spoke {} chunks ({} bytes)", report.chunks, report.bytes);
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!("murmur: talking to {} via {}", self.session.config().model, self.session.provider_name());
        println!("Voice: {} ({})", self.pipeline.config().voice, self.output.name());
        if self.forwarder.is_some() {
            println!("Lip sync: VTube Studio");
        }
        println!("Type a message and press Enter. /help lists commands, q or /exit quits.");
        println!();
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  /help, ?            Show this help message");
        println!("  /reset              Forget the conversation so far");
        println!("  /system <prompt>    Replace the system prompt (empty removes it)");
        println!("  /exit, quit, q      Leave");
        println!("Ctrl-C interrupts an answer; at the prompt it quits.");
    }
}
