//! The game proper: state tracking and the phase state machine.
//!
//! - [`state::GameState`] — alive-map, kill/vote logs, and win evaluation.
//! - [`engine::Engine`] — drives `init → night → day → … → finished`,
//!   broadcasting events and terminating as soon as a side has won.

pub mod engine;
pub mod state;

// Re-export commonly used items at the module level.
pub use engine::{Engine, EngineConfig, Outcome, run_game};
pub use state::{DAY_ELIMINATION, GameState, KillRecord, VoteRecord, Winner};
