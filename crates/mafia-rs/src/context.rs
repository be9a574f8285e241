//! Shared broadcast window and role-based visibility filtering.
//!
//! Every game owns exactly one [`SharedContext`]: a bounded, FIFO-evicting
//! window of broadcast [`Message`]s. Agents never write to it directly — the
//! engine broadcasts, agents read. What each agent *sees* is decided by
//! [`visible_messages`], a pure function over the closed `{civilian, mafia}`
//! role set: civilians only see day-tagged messages, mafia see everything
//! including night coordination. The asymmetry is enforced by construction,
//! not by trusting the model to keep a secret.

use std::collections::VecDeque;

use crate::agent::Role;

// ── Phase tags ─────────────────────────────────────────────────────

/// Phase of the game, also used as the tag on broadcast messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Night,
    Day,
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Init => write!(f, "INIT"),
            Phase::Night => write!(f, "NIGHT"),
            Phase::Day => write!(f, "DAY"),
            Phase::Finished => write!(f, "FINISHED"),
        }
    }
}

// ── Messages ───────────────────────────────────────────────────────

/// A single broadcast message. Immutable once created.
///
/// Formats as `[NIGHT 2] Mafia killed Carol.` for system announcements and
/// `[DAY 1] [ALICE (CIVILIAN) -> ALL] I suspect Bob.` for player statements.
/// The recipient scope is always `ALL` — this design has no private channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    phase: Phase,
    index: u32,
    speaker: Option<(String, Role)>,
    body: String,
}

impl Message {
    /// A system announcement (no sender), e.g. a kill broadcast.
    pub fn system(phase: Phase, index: u32, body: impl Into<String>) -> Self {
        Self {
            phase,
            index,
            speaker: None,
            body: body.into().trim().to_string(),
        }
    }

    /// A statement made by a player.
    pub fn player(
        phase: Phase,
        index: u32,
        name: impl Into<String>,
        role: Role,
        body: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            index,
            speaker: Some((name.into(), role)),
            body: body.into().trim().to_string(),
        }
    }

    /// The phase this message was broadcast in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The message body, without phase or speaker tags.
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.speaker {
            Some((name, role)) => write!(
                f,
                "[{} {}] [{} ({}) -> ALL] {}",
                self.phase,
                self.index,
                name.to_uppercase(),
                role.to_string().to_uppercase(),
                self.body,
            ),
            None => write!(f, "[{} {}] {}", self.phase, self.index, self.body),
        }
    }
}

// ── Shared context window ──────────────────────────────────────────

/// Bounded FIFO window of broadcast messages, shared by all agents of a game.
///
/// The capacity is a hard cap: inserting into a full window evicts the oldest
/// entry. The window is never cleared automatically — [`clear`](Self::clear)
/// exists for explicit phase-boundary resets only.
#[derive(Debug, Clone)]
pub struct SharedContext {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl SharedContext {
    /// Create an empty window holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message, evicting the oldest entry if the window is full.
    pub fn add(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// The current window in chronological order.
    pub fn history(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Empty the window.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ── Visibility filter ──────────────────────────────────────────────

/// Filter a message history down to what `role` is allowed to see.
///
/// Civilians see only day-tagged messages; mafia see the full history,
/// night coordination included. The rule set is fixed and exhaustive, so
/// this is a plain match rather than anything dynamically dispatched.
pub fn visible_messages<'a>(
    history: impl Iterator<Item = &'a Message>,
    role: Role,
) -> Vec<&'a Message> {
    match role {
        Role::Mafia => history.collect(),
        Role::Civilian => history.filter(|m| m.phase() == Phase::Day).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_msg(index: u32, body: &str) -> Message {
        Message::system(Phase::Day, index, body)
    }

    fn night_msg(index: u32, body: &str) -> Message {
        Message::system(Phase::Night, index, body)
    }

    #[test]
    fn fifo_eviction_at_exact_boundary() {
        let mut ctx = SharedContext::new(3);
        for i in 0..4 {
            ctx.add(day_msg(1, &format!("msg-{i}")));
        }
        assert_eq!(ctx.len(), 3);
        let bodies: Vec<&str> = ctx.history().map(Message::body).collect();
        // Oldest entry gone, newest present, order preserved.
        assert_eq!(bodies, vec!["msg-1", "msg-2", "msg-3"]);
    }

    #[test]
    fn add_trims_whitespace() {
        let mut ctx = SharedContext::new(4);
        ctx.add(day_msg(1, "  hello  \n"));
        assert_eq!(ctx.history().next().unwrap().body(), "hello");
    }

    #[test]
    fn clear_empties_window() {
        let mut ctx = SharedContext::new(4);
        ctx.add(day_msg(1, "a"));
        ctx.add(night_msg(1, "b"));
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.capacity(), 4);
    }

    #[test]
    fn civilians_never_see_night_messages() {
        let mut ctx = SharedContext::new(10);
        for n in 1..=3 {
            ctx.add(night_msg(n, &format!("Mafia killed victim-{n}.")));
            ctx.add(day_msg(n, &format!("day talk {n}")));
        }
        let visible = visible_messages(ctx.history(), Role::Civilian);
        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|m| m.phase() == Phase::Day));
    }

    #[test]
    fn mafia_see_both_tags() {
        let mut ctx = SharedContext::new(10);
        ctx.add(night_msg(1, "kill plan"));
        ctx.add(day_msg(1, "innocent chatter"));
        let visible = visible_messages(ctx.history(), Role::Mafia);
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn display_formats_tags() {
        let sys = Message::system(Phase::Night, 2, "Mafia killed Carol.");
        assert_eq!(sys.to_string(), "[NIGHT 2] Mafia killed Carol.");

        let said = Message::player(Phase::Day, 1, "Alice", Role::Civilian, "I suspect Bob.");
        assert_eq!(
            said.to_string(),
            "[DAY 1] [ALICE (CIVILIAN) -> ALL] I suspect Bob."
        );
    }
}
