//! Run one LLM-driven Mafia game from a config file.
//!
//! Loads the player roster and backend settings from a JSON config, plays
//! the game against an Ollama server, appends the transcript to
//! `<log-dir>/game.log`, and prints the winner.
//!
//! # Examples
//!
//! ```sh
//! # Play with the defaults (config.json, logs/)
//! mafia
//!
//! # Point at a different server and model
//! mafia --config table.json --host http://gpu-box:11434 --model llama3:8b
//!
//! # Reproducible fallback choices
//! mafia --seed 42
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use mafia_rs::game::{EngineConfig, Outcome, run_game};
use mafia_rs::{EventLog, GameConfig, OllamaClient};
use tracing_subscriber::EnvFilter;

/// Run one LLM-driven Mafia game from a config file.
#[derive(Parser)]
#[command(name = "mafia")]
struct Cli {
    /// Path to the game configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory for the append-only game transcript.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Override the Ollama host from the config.
    #[arg(long)]
    host: Option<String>,

    /// Override the model identifier from the config.
    #[arg(long)]
    model: Option<String>,

    /// Override the sampling temperature from the config.
    #[arg(long)]
    temperature: Option<f32>,

    /// Override the nucleus sampling threshold from the config.
    #[arg(long)]
    top_p: Option<f32>,

    /// Override the shared context window size from the config.
    #[arg(long)]
    context_window: Option<usize>,

    /// Seed for deterministic fallback choices.
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum night/day cycles before giving up.
    #[arg(long, default_value_t = 64)]
    max_cycles: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match GameConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    apply_overrides(&mut config, &cli);
    // Re-check after overrides: flags can break an otherwise valid config
    // (e.g. --context-window 0).
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let log = match EventLog::create(&cli.log_dir) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error: failed to open transcript log: {e}");
            process::exit(1);
        }
    };

    let client = match OllamaClient::new(&config.ollama) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: failed to create model client: {e}");
            process::exit(1);
        }
    };

    let mut engine_config = EngineConfig::default().with_max_cycles(cli.max_cycles);
    engine_config.seed = cli.seed;

    match run_game(&client, &config, engine_config, log).await {
        Ok(Outcome::Decided(winner)) => println!("Winner: {winner}"),
        Ok(Outcome::Unfinished) => {
            eprintln!("No winner after {} cycles", cli.max_cycles);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: failed to write transcript: {e}");
            process::exit(1);
        }
    }
}

/// Copy CLI overrides onto the loaded config. Flags win over the file.
fn apply_overrides(config: &mut GameConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.ollama.host = host.clone();
    }
    if let Some(model) = &cli.model {
        config.ollama.model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.ollama.temperature = temperature;
    }
    if let Some(top_p) = cli.top_p {
        config.ollama.top_p = top_p;
    }
    if let Some(context_window) = cli.context_window {
        config.context.max_messages = context_window;
    }
}
