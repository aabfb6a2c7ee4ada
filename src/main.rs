mod assistant;
mod audio;
mod chat;
mod command;
mod config;
mod error;
mod generate;
mod input;
mod launcher;
mod llm;
mod speech;
mod transcriber;
mod vad;

use assistant::{Assistant, Flow};
use chat::Transcript;
use config::Config;
use input::SpeechRecognizer;

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jarvis", about = "Voice and text command assistant")]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen on the microphone before asking for typed input
    #[arg(long, conflicts_with = "no_speech")]
    speech: bool,

    /// Typed input only
    #[arg(long)]
    no_speech: bool,

    /// Do not send unmatched input to the model
    #[arg(long)]
    no_chat: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if self.speech {
            config.speech.enabled = true;
        }
        if self.no_speech {
            config.speech.enabled = false;
        }
        if self.no_chat {
            config.chat.enabled = false;
        }
    }
}

#[hotpath::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    if let Err(e) = dotenv::dotenv() {
        tracing::debug!("no .env loaded: {}", e);
    }

    let mut config = Config::load(&cli.config);
    cli.apply(&mut config);

    ctrlc::set_handler(|| {
        println!("\nGoodbye!");
        std::process::exit(0);
    })?;

    let model = match llm::from_config(&config.llm) {
        Ok(model) => Some(model),
        Err(e) => {
            println!("WARNING: language model unavailable: {}", e);
            if matches!(config.llm, config::LlmConfig::Gemini { .. }) {
                println!("Looking for gemini_api_key in the environment or .env");
                println!("Please create a .env file with: gemini_api_key=YOUR_KEY_HERE");
            }
            None
        }
    };

    print_banner(&config, model.is_some());

    let mut recognizer = config
        .speech
        .enabled
        .then(|| speech::LocalRecognizer::new(&config.speech));

    let mut assistant = Assistant::new(&config, launcher::system_launcher(), model, io::stdout());
    let mut transcript = Transcript::new(&config.name);

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout();

    loop {
        println!("\nSay something or type your command:");

        let speech = recognizer
            .as_mut()
            .map(|r| r as &mut dyn SpeechRecognizer);
        let Some(query) = input::acquire(speech, &mut stdin, &mut stdout)? else {
            println!("\nGoodbye!");
            break;
        };

        if query.is_empty() {
            continue;
        }

        if assistant.handle(&query, &mut transcript) == Flow::Exit {
            break;
        }
    }

    if !transcript.is_empty() {
        tracing::debug!(turns = transcript.len(), "session transcript:\n{}", transcript);
    }

    stdout.flush()?;
    Ok(())
}

fn print_banner(config: &Config, model_ready: bool) {
    let on_off = |enabled: bool| if enabled { "Enabled" } else { "Disabled" };
    let rule = "=".repeat(50);

    println!("{}", rule);
    println!("       Welcome to {} A.I", config.name);
    println!("{}", rule);
    println!("Speech Recognition: {}", on_off(config.speech.enabled));
    println!("Chatbot: {}", on_off(config.chat.enabled));
    if model_ready {
        println!("Model: {}", config.llm.describe());
    } else {
        println!("Model: unavailable");
    }
    println!("{}", rule);
}
