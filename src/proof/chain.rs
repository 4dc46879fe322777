//! Checkpoint Hash Chain
//!
//! Every tick's world hash is folded into a running chain:
//!
//! ```text
//! chain(0) = mix(CHAIN_SEED, hash(0))
//! chain(t) = mix(chain(t-1), hash(t))
//! ```
//!
//! so the chain value at any tick commits to the entire history before it.
//! The recorder hashes every tick but only retains a sparse set of
//! checkpoints: tick 0, every `interval` ticks, and the final tick.

use serde::{Serialize, Deserialize};

use crate::core::hash::{chain_mix, CHAIN_SEED};
use crate::game::error::SimError;
use crate::game::state::WorldState;

/// A hashed snapshot of world state at one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Tick number
    pub tick: u32,
    /// Canonical world hash at this tick
    pub hash: u32,
    /// Chain hash through this tick
    pub chain: u32,
}

/// Find the checkpoint for `tick` in a tick-ordered slice.
pub fn checkpoint_at(checkpoints: &[Checkpoint], tick: u32) -> Option<&Checkpoint> {
    checkpoints
        .binary_search_by_key(&tick, |c| c.tick)
        .ok()
        .map(|i| &checkpoints[i])
}

/// Append-only recorder of the hash chain.
#[derive(Clone, Debug)]
pub struct ChainRecorder {
    interval: u32,
    latest: Option<Checkpoint>,
    retained: Vec<Checkpoint>,
}

impl ChainRecorder {
    /// Recorder retaining every `interval`-th tick.
    pub fn new(interval: u32) -> Result<Self, SimError> {
        if interval == 0 {
            return Err(SimError::InvalidConfig("checkpoint interval is zero".into()));
        }
        Ok(Self { interval, latest: None, retained: Vec::new() })
    }

    /// Fold the hash of the next tick into the chain.
    ///
    /// Ticks must arrive as 0, 1, 2, ... with no gaps or repeats.
    pub fn record(&mut self, tick: u32, hash: u32) -> Result<Checkpoint, SimError> {
        let prev_chain = match self.latest {
            None if tick == 0 => CHAIN_SEED,
            Some(last) if last.tick.checked_add(1) == Some(tick) => last.chain,
            _ => return Err(SimError::Invariant("checkpoint ticks must be consecutive")),
        };
        let checkpoint = Checkpoint { tick, hash, chain: chain_mix(prev_chain, hash) };
        if tick % self.interval == 0 {
            self.retained.push(checkpoint);
        }
        self.latest = Some(checkpoint);
        Ok(checkpoint)
    }

    /// Hash a world and record it.
    pub fn record_world(&mut self, world: &WorldState) -> Result<Checkpoint, SimError> {
        self.record(world.tick, world.compute_hash())
    }

    /// Retain the latest checkpoint as the final one. Idempotent.
    pub fn seal(&mut self) {
        if let Some(latest) = self.latest {
            if self.retained.last() != Some(&latest) {
                self.retained.push(latest);
            }
        }
    }

    /// Most recently recorded checkpoint.
    pub fn latest(&self) -> Option<Checkpoint> {
        self.latest
    }

    /// Chain hash through the latest tick.
    pub fn chain_hash(&self) -> Option<u32> {
        self.latest.map(|c| c.chain)
    }

    /// Retained checkpoints, in tick order.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.retained
    }

    /// Retained checkpoint at `tick`, if any.
    pub fn at(&self, tick: u32) -> Option<&Checkpoint> {
        checkpoint_at(&self.retained, tick)
    }

    /// Consume the recorder.
    pub fn into_checkpoints(self) -> Vec<Checkpoint> {
        self.retained
    }
}
