//! The phase state machine: `init → night → day → … → finished`.
//!
//! The engine owns the one [`SharedContext`] and [`GameState`] of a game and
//! drives fully sequential turns: within a round each player's model call
//! completes before the next begins, because later speakers and voters are
//! meant to be influenced by earlier broadcasts. Speculative parallelism
//! would change game semantics and is deliberately absent.
//!
//! Win conditions are checked immediately after every phase, so a game can
//! end without a day phase ever running.

use std::io;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::ModelBackend;
use crate::agent::{Agent, Decision, Role};
use crate::config::GameConfig;
use crate::context::{Message, Phase, SharedContext};
use crate::game::state::{DAY_ELIMINATION, GameState, Winner};
use crate::logging::EventLog;

/// Instruction given to every living player in the discussion round.
const DISCUSSION_INSTRUCTION: &str =
    "Share your thoughts about who might be mafia. Keep it short (1-2 sentences).";

// ── Config ─────────────────────────────────────────────────────────

/// Engine knobs not derived from the game configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Safety cap on night/day cycles. A well-formed game removes at least
    /// one player per cycle and ends long before this; the cap only stops a
    /// degenerate setup from spinning forever.
    pub max_cycles: u32,
    /// Seed for the fallback RNG. `None` seeds from entropy; tests pass a
    /// fixed seed for reproducible fallback choices.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: 64,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ── Outcome ────────────────────────────────────────────────────────

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One side won.
    Decided(Winner),
    /// The cycle cap was hit before either side won.
    Unfinished,
}

// ── Engine ─────────────────────────────────────────────────────────

/// Drives one game to completion over a model backend.
pub struct Engine<'a, B: ModelBackend> {
    backend: &'a B,
    agents: Vec<Agent>,
    mafia_names: Vec<String>,
    context: SharedContext,
    state: GameState,
    log: EventLog,
    rng: StdRng,
    max_cycles: u32,
}

impl<'a, B: ModelBackend> Engine<'a, B> {
    /// Build an engine over an already-validated player list.
    pub fn new(
        backend: &'a B,
        agents: Vec<Agent>,
        context_capacity: usize,
        config: EngineConfig,
        log: EventLog,
    ) -> Self {
        let mafia_names: Vec<String> = agents
            .iter()
            .filter(|a| a.role() == Role::Mafia)
            .map(|a| a.name().to_string())
            .collect();
        let state = GameState::new(agents.iter().map(|a| a.name().to_string()));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            backend,
            agents,
            mafia_names,
            context: SharedContext::new(context_capacity),
            state,
            log,
            rng,
            max_cycles: config.max_cycles,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Run the night/day loop until a side wins or the cycle cap is hit.
    pub async fn run(&mut self) -> io::Result<Outcome> {
        for _ in 0..self.max_cycles {
            self.night_phase().await?;
            if let Some(winner) = self.state.check_win(&self.mafia_names) {
                return self.conclude(winner);
            }
            self.day_phase().await?;
            if let Some(winner) = self.state.check_win(&self.mafia_names) {
                return self.conclude(winner);
            }
        }
        warn!("no winner after {} cycles; giving up", self.max_cycles);
        Ok(Outcome::Unfinished)
    }

    /// Night: each living mafia proposes a victim, the tally decides.
    ///
    /// A no-op (beyond the counter) when no non-mafia player lives — there is
    /// nothing to kill and the tally would run over an empty candidate set.
    async fn night_phase(&mut self) -> io::Result<()> {
        let night = self.state.begin_night();
        let living = self.state.living_players();
        let candidates: Vec<String> = living
            .iter()
            .filter(|name| !self.mafia_names.contains(name))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let mut proposals: Vec<String> = Vec::new();
        for name in &living {
            if !self.mafia_names.contains(name) {
                continue;
            }
            let Some(agent) = self.agents.iter().find(|a| a.name() == name.as_str()) else {
                continue;
            };
            let target = agent
                .choose_night_target(self.backend, &self.context, &candidates, &mut self.rng)
                .await;
            proposals.push(target);
        }
        debug!("night {night}: {} proposal(s) tallied", proposals.len());

        if let Some(victim) = tally(&candidates, proposals.iter()) {
            self.state.kill(&victim, night);
            self.broadcast(Message::system(
                Phase::Night,
                night,
                format!("Mafia killed {victim}."),
            ))?;
        }
        Ok(())
    }

    /// Day: a discussion round, then a vote, over the players living at
    /// phase entry.
    ///
    /// Statements are broadcast as they are made, so later speakers see
    /// earlier ones — an intentional speaking-order bias. Votes are collected
    /// in full before tallying: simultaneous-reveal semantics even though the
    /// ballots are gathered one at a time.
    async fn day_phase(&mut self) -> io::Result<()> {
        let day = self.state.begin_day();
        let participants = self.state.living_players();

        // Discussion round.
        for name in &participants {
            let Some(agent) = self.agents.iter().find(|a| a.name() == name.as_str()) else {
                continue;
            };
            let statement = match agent
                .decide(self.backend, &self.context, DISCUSSION_INSTRUCTION)
                .await
            {
                Decision::Answer(text) => text,
                // An abstaining player still takes their turn; they just
                // have nothing to say.
                Decision::Abstained => String::new(),
            };
            let role = agent.role();
            self.broadcast(Message::player(Phase::Day, day, name, role, statement))?;
        }

        // Voting round. Any living player is a valid target, self included.
        let candidates = participants.clone();
        let mut ballots: Vec<(String, String)> = Vec::with_capacity(participants.len());
        for name in &participants {
            let Some(agent) = self.agents.iter().find(|a| a.name() == name.as_str()) else {
                continue;
            };
            let target = agent
                .choose_vote(self.backend, &self.context, &candidates, &mut self.rng)
                .await;
            self.log.append(&format!("[DAY {day}] {name} voted for {target}"))?;
            ballots.push((name.clone(), target));
        }

        let eliminated = tally(&candidates, ballots.iter().map(|(_, target)| target));
        self.state.record_votes(day, ballots);
        if let Some(eliminated) = eliminated {
            self.state.kill(&eliminated, DAY_ELIMINATION);
            self.broadcast(Message::system(
                Phase::Day,
                day,
                format!("{eliminated} was eliminated by vote."),
            ))?;
        }
        Ok(())
    }

    /// Append to the transcript and to the one shared context.
    ///
    /// The context is shared by every agent, dead ones included — dead
    /// players keep "hearing" the narration.
    fn broadcast(&mut self, message: Message) -> io::Result<()> {
        self.log.append(&message.to_string())?;
        self.context.add(message);
        Ok(())
    }

    fn conclude(&mut self, winner: Winner) -> io::Result<Outcome> {
        self.state.finish();
        self.log.append(&format!(
            "Game over! Winner: {}",
            winner.to_string().to_uppercase()
        ))?;
        Ok(Outcome::Decided(winner))
    }
}

// ── Tallying ───────────────────────────────────────────────────────

/// Tally `votes` over `candidates` and return the first-seen maximum.
///
/// Ties resolve to the earliest candidate in iteration order. This is a
/// documented convention, not a game rule — any deterministic tie-break
/// would do, this one is kept for compatibility with the reference behavior.
/// Votes for names outside `candidates` are ignored; returns `None` only
/// when no vote landed on a candidate.
pub fn tally<'a>(
    candidates: &[String],
    votes: impl IntoIterator<Item = &'a String>,
) -> Option<String> {
    let mut counts = vec![0usize; candidates.len()];
    for vote in votes {
        if let Some(i) = candidates.iter().position(|c| c == vote) {
            counts[i] += 1;
        }
    }
    let mut best: Option<(usize, usize)> = None;
    for (i, &count) in counts.iter().enumerate() {
        if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((i, count));
        }
    }
    best.map(|(i, _)| candidates[i].clone())
}

// ── Entry point ────────────────────────────────────────────────────

/// Run one game from a validated configuration.
///
/// This is the call a process entry point makes once per invocation: build
/// the agents, wire the engine, and play to a result.
pub async fn run_game<B: ModelBackend>(
    backend: &B,
    game: &GameConfig,
    config: EngineConfig,
    log: EventLog,
) -> io::Result<Outcome> {
    let agents: Vec<Agent> = game
        .players
        .iter()
        .map(|p| Agent::new(p.name.clone(), p.role, p.persona.clone()))
        .collect();
    Engine::new(backend, agents, game.context.max_messages, config, log)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelError;
    use crate::logging::test_support::SharedBuf;
    use std::sync::Mutex;

    /// Backend stub that replays canned answers in call order, then empty
    /// strings (abstentions) once the script runs out.
    struct ScriptedBackend {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    impl ModelBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(String::new())
            } else {
                Ok(replies.remove(0))
            }
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn agent(name: &str, role: Role) -> Agent {
        Agent::new(name, role, "test persona")
    }

    fn seeded() -> EngineConfig {
        EngineConfig::default().with_seed(1)
    }

    // ── Tally ──────────────────────────────────────────────────────

    #[test]
    fn tally_picks_strict_majority() {
        let candidates = names(&["A", "B"]);
        let votes = names(&["A", "B", "A"]);
        assert_eq!(tally(&candidates, votes.iter()), Some("A".to_string()));
    }

    #[test]
    fn tally_tie_resolves_to_first_seen_candidate() {
        // Candidate order [B, A] with one vote each: B is the first-seen max.
        let candidates = names(&["B", "A"]);
        let votes = names(&["A", "B"]);
        assert_eq!(tally(&candidates, votes.iter()), Some("B".to_string()));
    }

    #[test]
    fn tally_ignores_unknown_names_and_empty_votes() {
        let candidates = names(&["A", "B"]);
        let votes = names(&["Zed", "B"]);
        assert_eq!(tally(&candidates, votes.iter()), Some("B".to_string()));

        let no_votes: Vec<String> = Vec::new();
        assert_eq!(tally(&candidates, no_votes.iter()), None);
    }

    // ── Phases ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn mafia_can_win_after_first_night_without_a_day() {
        // 2 mafia vs 3 civilians: one night kill reaches numeric parity, so
        // the game ends before any day phase runs.
        let backend = ScriptedBackend::new(&["Carol", "Carol"]);
        let agents = vec![
            agent("Alice", Role::Mafia),
            agent("Bob", Role::Mafia),
            agent("Carol", Role::Civilian),
            agent("Dave", Role::Civilian),
            agent("Eve", Role::Civilian),
        ];
        let mut engine = Engine::new(&backend, agents, 20, seeded(), EventLog::sink());

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome, Outcome::Decided(Winner::Mafia));
        assert_eq!(engine.state().night(), 1);
        assert_eq!(engine.state().day(), 0);
        assert_eq!(engine.state().kill_log().len(), 1);
        assert_eq!(engine.state().kill_log()[0].victim, "Carol");
        assert_eq!(engine.state().kill_log()[0].night, 1);
    }

    #[tokio::test]
    async fn night_is_a_noop_with_no_living_civilians() {
        // Degenerate all-mafia table: nothing to kill, and the win check
        // right after the night resolves it.
        let backend = ScriptedBackend::new(&[]);
        let agents = vec![agent("Alice", Role::Mafia), agent("Bob", Role::Mafia)];
        let mut engine = Engine::new(&backend, agents, 20, seeded(), EventLog::sink());

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome, Outcome::Decided(Winner::Mafia));
        assert_eq!(engine.state().night(), 1);
        assert!(engine.state().kill_log().is_empty());
        assert!(engine.context().is_empty());
    }

    #[tokio::test]
    async fn zero_cycle_cap_reports_unfinished() {
        let backend = ScriptedBackend::new(&[]);
        let agents = vec![agent("Alice", Role::Mafia), agent("Bob", Role::Civilian)];
        let config = seeded().with_max_cycles(0);
        let mut engine = Engine::new(&backend, agents, 20, config, EventLog::sink());
        assert_eq!(engine.run().await.unwrap(), Outcome::Unfinished);
    }

    #[tokio::test]
    async fn abstaining_voters_still_produce_valid_ballots() {
        // The script covers only the night kill; every statement and vote
        // after that is an abstention. Random fallbacks must keep the game
        // moving to a decision anyway.
        let backend = ScriptedBackend::new(&["Carol"]);
        let agents = vec![
            agent("Alice", Role::Mafia),
            agent("Bob", Role::Civilian),
            agent("Carol", Role::Civilian),
            agent("Dave", Role::Civilian),
        ];
        let mut engine = Engine::new(&backend, agents, 20, seeded(), EventLog::sink());

        let outcome = engine.run().await.unwrap();
        assert!(matches!(outcome, Outcome::Decided(_)));

        // Night 1 killed Carol; day 1's three ballots were all fallbacks and
        // every one of them must land on a living player.
        assert_eq!(engine.state().vote_log().len(), 1);
        let ballot = &engine.state().vote_log()[0].votes;
        assert_eq!(ballot.len(), 3);
        let living_at_day_one = names(&["Alice", "Bob", "Dave"]);
        for (voter, target) in ballot {
            assert!(
                living_at_day_one.contains(target),
                "{voter} cast an invalid ballot: {target:?}"
            );
        }
    }

    #[tokio::test]
    async fn full_game_civilians_win_and_transcript_is_ordered() {
        // 2 mafia vs 4 civilians, fully scripted:
        //   night 1 — both mafia target Carol
        //   day 1   — 5 statements, everyone votes Bob (mafia down to 1)
        //   night 2 — Alice targets Dave
        //   day 2   — 3 statements, everyone votes Alice (mafia eliminated)
        let mut script = vec!["Carol", "Carol"];
        script.extend(["statement"; 5]);
        script.extend(["Bob"; 5]);
        script.push("Dave");
        script.extend(["statement"; 3]);
        script.extend(["Alice"; 3]);
        let backend = ScriptedBackend::new(&script);

        let agents = vec![
            agent("Alice", Role::Mafia),
            agent("Bob", Role::Mafia),
            agent("Carol", Role::Civilian),
            agent("Dave", Role::Civilian),
            agent("Eve", Role::Civilian),
            agent("Frank", Role::Civilian),
        ];
        let buf = SharedBuf::default();
        let log = EventLog::from_writer(Box::new(buf.clone()));
        let mut engine = Engine::new(&backend, agents, 64, seeded(), log);

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome, Outcome::Decided(Winner::Civilians));
        assert_eq!(engine.state().night(), 2);
        assert_eq!(engine.state().day(), 2);
        assert_eq!(engine.state().living_players(), names(&["Eve", "Frank"]));

        let victims: Vec<(u32, &str)> = engine
            .state()
            .kill_log()
            .iter()
            .map(|k| (k.night, k.victim.as_str()))
            .collect();
        assert_eq!(
            victims,
            vec![(1, "Carol"), (0, "Bob"), (2, "Dave"), (0, "Alice")]
        );
        assert_eq!(engine.state().vote_log().len(), 2);
        assert_eq!(engine.state().vote_log()[0].votes.len(), 5);
        assert_eq!(engine.state().vote_log()[1].votes.len(), 3);

        let lines = buf.lines();
        assert_eq!(lines.first().unwrap(), "[NIGHT 1] Mafia killed Carol.");
        assert!(lines.contains(&"[DAY 1] Alice voted for Bob".to_string()));
        assert!(lines.contains(&"[DAY 1] Bob was eliminated by vote.".to_string()));
        assert!(lines.contains(&"[NIGHT 2] Mafia killed Dave.".to_string()));
        assert_eq!(lines.last().unwrap(), "Game over! Winner: CIVILIANS");
    }

    #[tokio::test]
    async fn full_game_mafia_win_at_one_to_one_parity() {
        // 2 mafia vs 4 civilians, fully scripted, mafia kept alive through
        // both phase types:
        //   night 1 — both mafia target Carol        (2 mafia vs 3 civilians)
        //   day 1   — 5 statements, everyone votes Bob (1 mafia vs 3 civilians)
        //   night 2 — Alice targets Dave             (1 mafia vs 2 civilians)
        //   day 2   — 3 statements, everyone votes Eve
        // Alice and Frank remain: one mafia against one civilian, so the
        // parity check after day 2 hands the game to the mafia.
        let mut script = vec!["Carol", "Carol"];
        script.extend(["statement"; 5]);
        script.extend(["Bob"; 5]);
        script.push("Dave");
        script.extend(["statement"; 3]);
        script.extend(["Eve"; 3]);
        let backend = ScriptedBackend::new(&script);

        let agents = vec![
            agent("Alice", Role::Mafia),
            agent("Bob", Role::Mafia),
            agent("Carol", Role::Civilian),
            agent("Dave", Role::Civilian),
            agent("Eve", Role::Civilian),
            agent("Frank", Role::Civilian),
        ];
        let mut engine = Engine::new(&backend, agents, 64, seeded(), EventLog::sink());

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome, Outcome::Decided(Winner::Mafia));
        assert_eq!(engine.state().night(), 2);
        assert_eq!(engine.state().day(), 2);
        assert_eq!(engine.state().living_players(), names(&["Alice", "Frank"]));

        let victims: Vec<(u32, &str)> = engine
            .state()
            .kill_log()
            .iter()
            .map(|k| (k.night, k.victim.as_str()))
            .collect();
        assert_eq!(
            victims,
            vec![(1, "Carol"), (0, "Bob"), (2, "Dave"), (0, "Eve")]
        );
    }

    #[tokio::test]
    async fn dead_players_keep_receiving_broadcasts() {
        // Same shared window serves everyone, so broadcasts made after a
        // player's death still land in the context that player reads.
        let mut script = vec!["Carol", "Carol"];
        script.extend(["statement"; 5]);
        script.extend(["Bob"; 5]);
        let backend = ScriptedBackend::new(&script);
        let agents = vec![
            agent("Alice", Role::Mafia),
            agent("Bob", Role::Mafia),
            agent("Carol", Role::Civilian),
            agent("Dave", Role::Civilian),
            agent("Eve", Role::Civilian),
            agent("Frank", Role::Civilian),
        ];
        let mut engine = Engine::new(&backend, agents, 64, seeded(), EventLog::sink());
        engine.run().await.unwrap();

        // Carol died on night 1; day-1 messages were still broadcast into
        // the window she reads from.
        let carol = Agent::new("Carol", Role::Civilian, "p");
        let visible = carol.visible_history(engine.context());
        assert!(!visible.is_empty());
        assert!(visible.iter().all(|m| m.phase() == Phase::Day));
    }
}
