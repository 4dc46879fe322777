//! Replay Driver
//!
//! [`Simulation`] drives a run tick by tick, recording the hash chain as it
//! goes. The client uses it for live play, scheduling actions as the player
//! makes them; [`replay`] feeds it a complete event log and runs it to the
//! end. Both go through the same code path, so a run played live and the same
//! run replayed from its log produce identical checkpoints.

use serde::{Serialize, Deserialize};

use crate::game::action::{PlayerAction, PlayerEvent};
use crate::game::config::SimulationConfig;
use crate::game::error::SimError;
use crate::game::state::{Outcome, WorldState};
use crate::game::stats::Side;
use crate::game::tick::{tick, TickResult};
use crate::proof::chain::{ChainRecorder, Checkpoint};

/// End-of-run tallies the client reports and the server recomputes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Waves fully cleared
    pub waves_cleared: u32,
    /// Enemies killed
    pub kills: u32,
    /// Elite enemies killed
    pub elite_kills: u32,
    /// Resources earned from bounties
    pub resources_earned: u32,
}

impl RunSummary {
    /// Tallies of the player side.
    pub fn from_world(world: &WorldState) -> Self {
        let home = &world.stats[Side::Home.index()];
        Self {
            waves_cleared: world.waves.cleared,
            kills: home.kills,
            elite_kills: home.elite_kills,
            resources_earned: home.resources,
        }
    }
}

/// Everything a finished replay produced.
#[derive(Clone, Debug)]
pub struct ReplayOutcome {
    /// Retained checkpoints (tick 0, every interval, final tick)
    pub checkpoints: Vec<Checkpoint>,
    /// World at the final tick
    pub final_state: WorldState,
    /// Chain hash at the final tick
    pub final_hash: u32,
    /// Final tick
    pub end_tick: u32,
    /// How the run ended
    pub outcome: Outcome,
    /// Score at the end
    pub score: u32,
    /// Tallies at the end
    pub summary: RunSummary,
    /// Logged events scheduled after the final tick, never applied
    pub events_past_end: usize,
}

/// A run being simulated.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    world: WorldState,
    recorder: ChainRecorder,
    log: Vec<PlayerEvent>,
    /// Index of the first log entry not yet applied
    cursor: usize,
    next_seq: u32,
}

impl Simulation {
    /// Start a run: build the tick-0 world and record its checkpoint.
    pub fn new(seed: i32, config: SimulationConfig) -> Result<Self, SimError> {
        let world = WorldState::new_run(seed, &config)?;
        let mut recorder = ChainRecorder::new(config.checkpoint_interval)?;
        recorder.record_world(&world)?;
        Ok(Self {
            config,
            world,
            recorder,
            log: Vec::new(),
            cursor: 0,
            next_seq: 0,
        })
    }

    /// Start a run with a complete, (tick, seq)-ordered event log.
    pub fn with_log(seed: i32, config: SimulationConfig, events: Vec<PlayerEvent>) -> Result<Self, SimError> {
        if let Some(pair) = events.windows(2).find(|p| p[1].key() < p[0].key()) {
            return Err(SimError::UnorderedEvents { seq: pair[1].seq });
        }
        // a tick-0 event would precede the initial state
        if let Some(early) = events.iter().find(|e| e.tick == 0) {
            return Err(SimError::UnorderedEvents { seq: early.seq });
        }
        let mut sim = Self::new(seed, config)?;
        sim.next_seq = events.iter().map(|e| e.seq.saturating_add(1)).max().unwrap_or(0);
        sim.log = events;
        Ok(sim)
    }

    /// Schedule a player action for the next tick. Returns its seq.
    pub fn submit(&mut self, action: PlayerAction) -> Result<u32, SimError> {
        if self.world.is_ended() {
            return Err(SimError::RunEnded(self.world.tick));
        }
        let seq = self.next_seq;
        let at = self.world.tick + 1;
        if self.log.last().is_some_and(|last| last.tick > at) {
            return Err(SimError::UnorderedEvents { seq });
        }
        self.next_seq += 1;
        self.log.push(PlayerEvent::new(seq, at, action));
        Ok(seq)
    }

    /// Advance one tick and record its checkpoint.
    pub fn step(&mut self) -> Result<TickResult, SimError> {
        let next = self.world.tick + 1;
        let start = self.cursor;
        while self.log.get(self.cursor).is_some_and(|e| e.tick == next) {
            self.cursor += 1;
        }

        let result = tick(&mut self.world, &self.log[start..self.cursor], &self.config)?;
        self.recorder.record_world(&self.world)?;
        if result.outcome.is_some() {
            self.recorder.seal();
        }
        Ok(result)
    }

    /// Step until the run ends.
    pub fn run_to_end(&mut self) -> Result<Outcome, SimError> {
        loop {
            if let Some(outcome) = self.world.outcome {
                return Ok(outcome);
            }
            self.step()?;
        }
    }

    /// Current world.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Configuration snapshot.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current tick.
    pub fn current_tick(&self) -> u32 {
        self.world.tick
    }

    /// Has the run ended?
    pub fn is_finished(&self) -> bool {
        self.world.is_ended()
    }

    /// Outcome, once the run has ended.
    pub fn outcome(&self) -> Option<Outcome> {
        self.world.outcome
    }

    /// Retained checkpoints so far.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        self.recorder.checkpoints()
    }

    /// Chain hash through the current tick.
    pub fn chain_hash(&self) -> Option<u32> {
        self.recorder.chain_hash()
    }

    /// Final hash, once the run has ended.
    pub fn final_hash(&self) -> Option<u32> {
        if self.is_finished() {
            self.chain_hash()
        } else {
            None
        }
    }

    /// The event log, in (tick, seq) order.
    pub fn event_log(&self) -> &[PlayerEvent] {
        &self.log
    }

    /// Current score.
    pub fn score(&self) -> u32 {
        self.world.score()
    }

    /// Current tallies.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_world(&self.world)
    }

    /// Run to the end if needed and hand back everything it produced.
    pub fn finish(mut self) -> Result<ReplayOutcome, SimError> {
        let outcome = self.run_to_end()?;
        let final_hash = self
            .recorder
            .chain_hash()
            .ok_or(SimError::Invariant("no checkpoint recorded"))?;
        Ok(ReplayOutcome {
            score: self.world.score(),
            summary: RunSummary::from_world(&self.world),
            end_tick: self.world.tick,
            events_past_end: self.log.len() - self.cursor,
            checkpoints: self.recorder.into_checkpoints(),
            final_state: self.world,
            final_hash,
            outcome,
        })
    }
}

/// Replay a run from its inputs.
///
/// Pure: the same seed, config and log always produce the same outcome.
/// Events are assumed structurally valid; ordering is re-checked because a
/// misordered log would silently change which tick an event lands on.
pub fn replay(seed: i32, config: &SimulationConfig, events: &[PlayerEvent]) -> Result<ReplayOutcome, SimError> {
    Simulation::with_log(seed, config.clone(), events.to_vec())?.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::FixedVec2;

    fn short_config() -> SimulationConfig {
        SimulationConfig { max_ticks: 600, max_waves: 2, ..SimulationConfig::default() }
    }

    #[test]
    fn test_replay_matches_live_play() {
        let config = short_config();
        let mut live = Simulation::new(42, config.clone()).expect("sim");
        for _ in 0..100 {
            live.step().expect("step");
        }
        live.submit(PlayerAction::ActivateAbility { slot: 0, target: FixedVec2::from_ints(5, 0) })
            .expect("submit");
        live.run_to_end().expect("run");

        let replayed = replay(42, &config, live.event_log()).expect("replay");
        assert_eq!(Some(replayed.final_hash), live.final_hash());
        assert_eq!(replayed.checkpoints, live.checkpoints());
        assert_eq!(replayed.score, live.score());
        assert_eq!(replayed.events_past_end, 0);
    }

    #[test]
    fn test_checkpoint_layout() {
        let config = short_config();
        let outcome = replay(7, &config, &[]).expect("replay");
        assert_eq!(outcome.checkpoints.first().map(|c| c.tick), Some(0));
        assert_eq!(outcome.checkpoints.last().map(|c| c.tick), Some(outcome.end_tick));
        assert_eq!(outcome.checkpoints.last().map(|c| c.chain), Some(outcome.final_hash));
        for c in &outcome.checkpoints[..outcome.checkpoints.len() - 1] {
            assert_eq!(c.tick % config.checkpoint_interval, 0);
        }
    }

    #[test]
    fn test_unordered_log_is_refused() {
        let config = short_config();
        let log = vec![
            PlayerEvent::new(0, 20, PlayerAction::Reroll),
            PlayerEvent::new(1, 10, PlayerAction::Reroll),
        ];
        assert_eq!(replay(1, &config, &log).err(), Some(SimError::UnorderedEvents { seq: 1 }));
    }

    #[test]
    fn test_events_past_end_are_counted() {
        let config = short_config();
        let log = vec![PlayerEvent::new(0, 10_000, PlayerAction::Reroll)];
        let outcome = replay(1, &config, &log).expect("replay");
        assert_eq!(outcome.events_past_end, 1);
        assert_eq!(outcome.final_state.events_dropped, 0);
    }

    #[test]
    fn test_submit_after_end_fails() {
        let config = SimulationConfig { max_ticks: 5, ..short_config() };
        let mut sim = Simulation::new(1, config).expect("sim");
        assert_eq!(sim.run_to_end().expect("run"), Outcome::Timeout);
        assert_eq!(sim.submit(PlayerAction::Reroll).err(), Some(SimError::RunEnded(5)));
    }
}
