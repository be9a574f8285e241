//! Mafia social-deduction games played entirely by LLM agents.
//!
//! `mafia-rs` runs the classic Mafia party game with a language model behind
//! every seat. Each player gets a role (`civilian` or `mafia`), a persona, and
//! a visibility-filtered view of the shared conversation; the engine drives
//! the night/day loop, parses the models' free-text answers into game actions,
//! and stops when one side has won.
//!
//! The core pieces:
//!
//! - [`SharedContext`](context::SharedContext) — the single bounded FIFO
//!   window of broadcast messages every agent reads from.
//! - [`Agent`](agent::Agent) — identity + role + persona; composes prompts,
//!   filters history by role, and degrades backend failures to an abstention.
//! - [`GameState`](game::GameState) — alive-map, kill/vote logs, and the win
//!   evaluator.
//! - [`Engine`](game::Engine) — the `init → night → day → … → finished`
//!   state machine. [`run_game`](game::run_game) wires it all together.
//! - [`OllamaClient`] — the HTTP model backend, defined in this file.
//!
//! # Getting started
//!
//! ```ignore
//! use mafia_rs::{EngineConfig, EventLog, GameConfig, OllamaClient, run_game};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::load("config.json".as_ref())?;
//!     let client = OllamaClient::new(&config.ollama)?;
//!     let log = EventLog::create("logs".as_ref())?;
//!
//!     let outcome = run_game(&client, &config, EngineConfig::default(), log).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Design notes
//!
//! Execution is fully sequential: within a round each player's turn (including
//! its blocking model call) completes before the next begins, because later
//! speakers and voters are supposed to see earlier broadcasts. Model failures
//! never abort a game — every decision point falls back to a uniformly random
//! valid choice so the loop always makes forward progress.

pub mod agent;
pub mod config;
pub mod context;
pub mod game;
pub mod logging;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::OllamaConfig;

// Re-export the types most callers need at the crate root.
pub use agent::{Agent, Decision, Role};
pub use config::GameConfig;
pub use context::{Message, Phase, SharedContext};
pub use game::{Engine, EngineConfig, GameState, Outcome, Winner, run_game};
pub use logging::EventLog;

// ── Errors ─────────────────────────────────────────────────────────

/// Failure modes of a model backend call.
///
/// Both variants are recovered at the [`Agent`](agent::Agent) boundary and
/// converted into [`Decision::Abstained`](agent::Decision::Abstained); they
/// never reach the game loop.
#[derive(Debug)]
pub enum ModelError {
    /// Connection or HTTP-level failure (request error, non-2xx status).
    Transport(String),
    /// The backend answered, but the body was not understandable.
    Parse(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Transport(msg) => write!(f, "transport error: {msg}"),
            ModelError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

// ── Backend seam ───────────────────────────────────────────────────

/// A model backend: takes a prompt, returns free-form completion text.
///
/// [`OllamaClient`] is the production implementation; tests use scripted
/// stubs. Agents and the engine are generic over this trait so a whole game
/// can run without any network.
pub trait ModelBackend {
    /// Generate a completion for `prompt`.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, ModelError>> + Send;
}

// ── Wire types ─────────────────────────────────────────────────────

/// Request body for the Ollama `/api/generate` endpoint.
#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    /// Always `false` — a single JSON object is simpler to parse than a
    /// streamed sequence.
    stream: bool,
}

/// Raw response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawGenerateResponse {
    response: Option<String>,
}

/// Parse a `/api/generate` response body into the completion text.
///
/// Ollama may return a single JSON object or multiple JSON lines
/// (streaming-style output concatenated); in the latter case the last
/// complete line carries the full response.
fn parse_generate_body(body: &str) -> Result<String, ModelError> {
    let text = body.trim();
    let line = text.lines().last().unwrap_or(text);
    let parsed: RawGenerateResponse = serde_json::from_str(line)
        .map_err(|e| ModelError::Parse(format!("malformed response body: {e}")))?;
    Ok(parsed.response.unwrap_or_default())
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an Ollama server's `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl OllamaClient {
    /// Create a client from connection parameters.
    ///
    /// Trailing slashes on the host are stripped so URL joining stays
    /// predictable.
    pub fn new(config: &OllamaConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .user_agent("mafia-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }
}

impl ModelBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            temperature: self.temperature,
            top_p: self.top_p,
            stream: false,
        };

        debug!(
            "LLM request: model={}, prompt={} chars, temp={}, top_p={}",
            self.model,
            prompt.len(),
            self.temperature,
            self.top_p,
        );

        let start = Instant::now();
        let url = format!("{}/api/generate", self.host);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ModelError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ModelError::Transport(format!("Ollama HTTP {status}: {text}")));
        }

        parse_generate_body(&text)
    }
}
