//! Game configuration: players, context window, and backend connection.
//!
//! Loaded from a JSON file shaped like:
//!
//! ```json
//! {
//!   "players": [
//!     {"name": "Alice", "role": "mafia", "persona": "a smooth talker"},
//!     {"name": "Bob", "role": "civilian", "persona": "a nervous farmer"}
//!   ],
//!   "context": {"max_messages": 20},
//!   "ollama": {"host": "http://localhost:11434", "model": "mistral:latest"}
//! }
//! ```
//!
//! A malformed or inconsistent config is the one fatal error class in this
//! crate: the engine never starts on a bad [`GameConfig`].

use serde::Deserialize;
use std::path::Path;

use crate::agent::Role;

// ── Errors ─────────────────────────────────────────────────────────

/// Startup-time configuration failure. Always fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    /// The config file is not valid JSON (or has the wrong shape).
    Parse(serde_json::Error),
    /// The config parsed but describes an unplayable game.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Config types ───────────────────────────────────────────────────

/// One player's seat at the table.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    pub role: Role,
    pub persona: String,
}

/// Shared context window settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    /// Hard cap on the number of messages kept in the shared window.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

fn default_max_messages() -> usize {
    20
}

/// Connection and sampling parameters for the Ollama backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "mistral:latest".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// The full game configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub players: Vec<PlayerConfig>,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl GameConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: GameConfig = serde_json::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the config describes a playable game.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players.is_empty() {
            return Err(ConfigError::Invalid("no players configured".to_string()));
        }
        for player in &self.players {
            if player.name.trim().is_empty() {
                return Err(ConfigError::Invalid("player with empty name".to_string()));
            }
        }
        for (i, player) in self.players.iter().enumerate() {
            if self.players[..i].iter().any(|p| p.name == player.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate player name: {}",
                    player.name
                )));
            }
        }
        if !self.players.iter().any(|p| p.role == Role::Mafia) {
            return Err(ConfigError::Invalid(
                "at least one mafia player is required".to_string(),
            ));
        }
        if !self.players.iter().any(|p| p.role == Role::Civilian) {
            return Err(ConfigError::Invalid(
                "at least one civilian player is required".to_string(),
            ));
        }
        if self.context.max_messages == 0 {
            return Err(ConfigError::Invalid(
                "context.max_messages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of all mafia players, in registration order.
    pub fn mafia_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.role == Role::Mafia)
            .map(|p| p.name.clone())
            .collect()
    }
}
