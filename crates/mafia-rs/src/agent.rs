//! LLM-backed players: prompt composition, decisions, and fallbacks.
//!
//! An [`Agent`] is identity, role, and persona — nothing else. It does not
//! own game state; it reads the shared context through the role filter and
//! reports decisions. Every model failure is absorbed here: a transport or
//! parse error becomes [`Decision::Abstained`], and the name-choosing helpers
//! substitute a uniformly random candidate for any empty or unrecognized
//! answer. The engine can therefore always count on getting one valid name
//! back when the candidate list is non-empty.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ModelBackend;
use crate::context::{Message, SharedContext, visible_messages};

// ── Roles ──────────────────────────────────────────────────────────

/// A player's role. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Civilian,
    Mafia,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Civilian => write!(f, "civilian"),
            Role::Mafia => write!(f, "mafia"),
        }
    }
}

// ── Decisions ──────────────────────────────────────────────────────

/// Outcome of asking an agent for a decision.
///
/// `Abstained` covers both backend failures and empty responses. The
/// fallback policy lives at the call sites, in plain sight, rather than in a
/// catch-all error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The model produced a non-empty, trimmed answer.
    Answer(String),
    /// The backend failed or returned nothing usable.
    Abstained,
}

impl Decision {
    /// The answer text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Decision::Answer(text) => Some(text),
            Decision::Abstained => None,
        }
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// A single AI-controlled player.
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    role: Role,
    persona: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: Role, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            persona: persona.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// The slice of `context` this agent is allowed to see, per its role.
    pub fn visible_history<'a>(&self, context: &'a SharedContext) -> Vec<&'a Message> {
        visible_messages(context.history(), self.role)
    }

    /// Ask the model for a decision.
    ///
    /// Composes a prompt from identity, persona, role, the visibility-filtered
    /// history, and `instruction`, then delegates to the backend. Any backend
    /// error or empty response becomes [`Decision::Abstained`] — failures stop
    /// at this boundary and never abort the game loop.
    pub async fn decide<B: ModelBackend>(
        &self,
        backend: &B,
        context: &SharedContext,
        instruction: &str,
    ) -> Decision {
        let prompt = self.compose_prompt(context, instruction);
        match backend.generate(&prompt).await {
            Ok(response) => {
                let text = response.trim();
                if text.is_empty() {
                    Decision::Abstained
                } else {
                    Decision::Answer(text.to_string())
                }
            }
            Err(e) => {
                warn!("model request failed for {}: {e}", self.name);
                Decision::Abstained
            }
        }
    }

    /// Choose tonight's victim from `candidates` (mafia only).
    ///
    /// The answer must be exactly one of the candidate names; anything else
    /// falls back to a uniformly random candidate. With a non-empty candidate
    /// list the caller always gets a valid name back.
    pub async fn choose_night_target<B: ModelBackend>(
        &self,
        backend: &B,
        context: &SharedContext,
        candidates: &[String],
        rng: &mut impl Rng,
    ) -> String {
        let instruction = format!(
            "You are acting during the NIGHT phase with fellow mafia. \
             Choose exactly ONE civilian name from the list to eliminate tonight: {}. \
             Respond ONLY with the chosen name.",
            candidates.join(", "),
        );
        let decision = self.decide(backend, context, &instruction).await;
        self.resolve_choice(decision, candidates, rng)
    }

    /// Choose a player to vote out during the day.
    ///
    /// `candidates` is the full living-player set — voting for oneself is
    /// allowed. Same validation and random fallback as
    /// [`choose_night_target`](Self::choose_night_target).
    pub async fn choose_vote<B: ModelBackend>(
        &self,
        backend: &B,
        context: &SharedContext,
        candidates: &[String],
        rng: &mut impl Rng,
    ) -> String {
        let instruction = format!(
            "It is DAY. Choose ONE suspect to eliminate from the following alive players: {}. \
             Respond ONLY with the chosen name.",
            candidates.join(", "),
        );
        let decision = self.decide(backend, context, &instruction).await;
        self.resolve_choice(decision, candidates, rng)
    }

    fn compose_prompt(&self, context: &SharedContext, instruction: &str) -> String {
        let visible = self.visible_history(context);
        let history = visible
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are {}, persona: {}. Role in the Mafia game: {}.\n\
             Game context (recent messages):\n{history}\n\n\
             Instruction: {instruction}",
            self.name, self.persona, self.role,
        )
    }

    /// Map a decision onto the candidate set, falling back to a uniformly
    /// random candidate for abstentions and unrecognized names.
    fn resolve_choice(
        &self,
        decision: Decision,
        candidates: &[String],
        rng: &mut impl Rng,
    ) -> String {
        if let Some(text) = decision.text() {
            if let Some(name) = candidates.iter().find(|c| c.as_str() == text) {
                return name.clone();
            }
            debug!(
                "{} answered {text:?}, not a valid candidate; choosing at random",
                self.name
            );
        }
        candidates.choose(rng).cloned().unwrap_or_default()
    }
}
