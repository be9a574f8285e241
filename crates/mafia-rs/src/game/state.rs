//! Mutable game state: who is alive, what happened, and who has won.
//!
//! The alive-map is monotonic — a flag only ever flips `true → false`, and
//! killing a dead player is a no-op that records nothing. Kill and vote logs
//! are append-only. [`GameState::check_win`] evaluates the win conditions in
//! a fixed priority order: an all-mafia-eliminated game is a civilian win
//! regardless of how many civilians remain, including zero.

use crate::context::Phase;

/// Night-index sentinel marking a day-phase (vote) elimination in the kill
/// log. Real night kills carry their 1-based night counter.
pub const DAY_ELIMINATION: u32 = 0;

/// The winning side, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Civilians,
    Mafia,
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Civilians => write!(f, "civilians"),
            Winner::Mafia => write!(f, "mafia"),
        }
    }
}

/// One entry in the kill log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRecord {
    /// 1-based night counter, or [`DAY_ELIMINATION`] for a vote elimination.
    pub night: u32,
    pub victim: String,
}

/// One day's full ballot, in voting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub day: u32,
    /// `(voter, target)` pairs.
    pub votes: Vec<(String, String)>,
}

/// Tracks alive/dead status, phase counters, and the historical record.
#[derive(Debug, Clone)]
pub struct GameState {
    day: u32,
    night: u32,
    phase: Phase,
    /// `(name, alive)` in registration order. Entries are never removed,
    /// only flipped to dead; registration order is what makes downstream
    /// tallies reproducible.
    alive: Vec<(String, bool)>,
    kill_log: Vec<KillRecord>,
    vote_log: Vec<VoteRecord>,
}

impl GameState {
    /// Register the full player list. Everyone starts alive, phase `Init`.
    pub fn new(players: impl IntoIterator<Item = String>) -> Self {
        Self {
            day: 0,
            night: 0,
            phase: Phase::Init,
            alive: players.into_iter().map(|name| (name, true)).collect(),
            kill_log: Vec::new(),
            vote_log: Vec::new(),
        }
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn night(&self) -> u32 {
        self.night
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kill_log(&self) -> &[KillRecord] {
        &self.kill_log
    }

    pub fn vote_log(&self) -> &[VoteRecord] {
        &self.vote_log
    }

    /// Whether `name` is alive. Unknown names are dead.
    pub fn is_alive(&self, name: &str) -> bool {
        self.alive
            .iter()
            .find(|(n, _)| n == name)
            .is_some_and(|(_, alive)| *alive)
    }

    /// Living players in registration order.
    pub fn living_players(&self) -> Vec<String> {
        self.alive
            .iter()
            .filter(|(_, alive)| *alive)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Enter the next night. Returns the new night counter.
    pub fn begin_night(&mut self) -> u32 {
        self.phase = Phase::Night;
        self.night += 1;
        self.night
    }

    /// Enter the next day. Returns the new day counter.
    pub fn begin_day(&mut self) -> u32 {
        self.phase = Phase::Day;
        self.day += 1;
        self.day
    }

    /// Enter the terminal phase.
    pub fn finish(&mut self) {
        self.phase = Phase::Finished;
    }

    /// Mark `name` dead and append a kill record.
    ///
    /// Idempotent: killing a dead or unknown name changes nothing and logs
    /// nothing. `night` is the night counter for night kills, or
    /// [`DAY_ELIMINATION`] for a vote elimination.
    pub fn kill(&mut self, name: &str, night: u32) {
        let Some(entry) = self.alive.iter_mut().find(|(n, _)| n == name) else {
            return;
        };
        if entry.1 {
            entry.1 = false;
            self.kill_log.push(KillRecord {
                night,
                victim: name.to_string(),
            });
        }
    }

    /// Append an immutable snapshot of a day's full ballot.
    ///
    /// Recording does not compute the outcome; tallying is the engine's job.
    pub fn record_votes(&mut self, day: u32, votes: Vec<(String, String)>) {
        self.vote_log.push(VoteRecord { day, votes });
    }

    /// Evaluate the win conditions over the current alive-map.
    ///
    /// Checked in priority order: no living mafia is a civilian win even when
    /// the mafia-majority rule would also hold (e.g. zero living civilians);
    /// otherwise mafia win once they match or outnumber the living non-mafia.
    pub fn check_win(&self, mafia_names: &[String]) -> Option<Winner> {
        let mafia_alive = mafia_names
            .iter()
            .filter(|name| self.is_alive(name))
            .count();
        if mafia_alive == 0 {
            return Some(Winner::Civilians);
        }

        let others_alive = self
            .alive
            .iter()
            .filter(|(name, alive)| *alive && !mafia_names.contains(name))
            .count();
        if mafia_alive >= others_alive {
            return Some(Winner::Mafia);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn five_players() -> GameState {
        GameState::new(names(&["Alice", "Bob", "Carol", "Dave", "Eve"]))
    }

    #[test]
    fn everyone_starts_alive_in_registration_order() {
        let state = five_players();
        assert_eq!(state.phase(), Phase::Init);
        assert_eq!(
            state.living_players(),
            names(&["Alice", "Bob", "Carol", "Dave", "Eve"])
        );
    }

    #[test]
    fn unknown_name_is_dead() {
        let state = five_players();
        assert!(!state.is_alive("Zed"));
    }

    #[test]
    fn kill_is_idempotent_and_monotonic() {
        let mut state = five_players();
        state.kill("Carol", 1);
        assert!(!state.is_alive("Carol"));

        // Second kill: no resurrection, no duplicate log entry.
        state.kill("Carol", 2);
        assert!(!state.is_alive("Carol"));
        assert_eq!(state.kill_log().len(), 1);
        assert_eq!(state.kill_log()[0].night, 1);

        // Unknown victim: nothing happens.
        state.kill("Zed", 1);
        assert_eq!(state.kill_log().len(), 1);
    }

    #[test]
    fn day_elimination_uses_sentinel() {
        let mut state = five_players();
        state.kill("Bob", DAY_ELIMINATION);
        assert_eq!(state.kill_log()[0].night, DAY_ELIMINATION);
        assert_eq!(state.kill_log()[0].victim, "Bob");
    }

    #[test]
    fn living_players_keeps_registration_order_after_kills() {
        let mut state = five_players();
        state.kill("Bob", 1);
        state.kill("Dave", DAY_ELIMINATION);
        assert_eq!(state.living_players(), names(&["Alice", "Carol", "Eve"]));
    }

    #[test]
    fn phase_counters_advance() {
        let mut state = five_players();
        assert_eq!(state.begin_night(), 1);
        assert_eq!(state.phase(), Phase::Night);
        assert_eq!(state.begin_day(), 1);
        assert_eq!(state.begin_night(), 2);
        state.finish();
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn civilians_win_when_no_mafia_alive() {
        let mafia = names(&["Alice"]);
        let mut state = five_players();
        state.kill("Alice", DAY_ELIMINATION);
        assert_eq!(state.check_win(&mafia), Some(Winner::Civilians));
    }

    #[test]
    fn civilians_win_even_with_zero_civilians_left() {
        // Degenerate endgame: everyone is dead. No mafia alive must still
        // resolve to a civilian win, never to the majority rule.
        let mafia = names(&["Alice"]);
        let mut state = five_players();
        for name in ["Alice", "Bob", "Carol", "Dave", "Eve"] {
            state.kill(name, 1);
        }
        assert_eq!(state.check_win(&mafia), Some(Winner::Civilians));
    }

    #[test]
    fn mafia_win_on_numeric_parity() {
        let mafia = names(&["Alice", "Bob"]);
        let mut state = five_players();
        state.kill("Carol", 1);
        // 2 mafia vs 2 civilians.
        assert_eq!(state.check_win(&mafia), Some(Winner::Mafia));
    }

    #[test]
    fn game_continues_while_civilians_hold_majority() {
        let mafia = names(&["Alice", "Bob"]);
        let state = five_players();
        // 2 mafia vs 3 civilians.
        assert_eq!(state.check_win(&mafia), None);
    }

    #[test]
    fn record_votes_appends_snapshot() {
        let mut state = five_players();
        let ballot = vec![
            ("Alice".to_string(), "Bob".to_string()),
            ("Bob".to_string(), "Alice".to_string()),
        ];
        state.record_votes(1, ballot.clone());
        assert_eq!(state.vote_log().len(), 1);
        assert_eq!(state.vote_log()[0].day, 1);
        assert_eq!(state.vote_log()[0].votes, ballot);
    }
}
