//! Game Events
//!
//! Output stream produced by the pipeline for external collaborators
//! (rendering, UI, telemetry). Never hashed and never read back by the
//! simulation: dropping every event changes nothing about a run.

use serde::{Serialize, Deserialize};

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::action::DropReason;
use crate::game::state::{EntityId, Outcome};
use crate::game::stats::{AbilityKind, CombatantKind, Side, UpgradeKind};

/// Display ordering inside one tick.
///
/// Lower value = shown first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Run termination
    RunEnded = 0,
    /// Deaths
    Death = 1,
    /// Wave and prompt changes
    Progression = 2,
    /// Abilities and upgrades
    PlayerAction = 3,
    /// Spawns
    Spawn = 4,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A combatant entered the field
    Spawned {
        /// New entity
        id: EntityId,
        /// Its kind
        kind: CombatantKind,
        /// Elite enemy?
        elite: bool,
    },

    /// A combatant died
    Died {
        /// The dead entity
        id: EntityId,
        /// Its kind
        kind: CombatantKind,
        /// Whoever dealt the killing blow, if it came from an entity
        killer: Option<EntityId>,
    },

    /// A wave started spawning
    WaveStarted {
        /// Wave number
        wave: u32,
        /// Enemies in the wave
        enemies: u32,
    },

    /// Every enemy of a wave is dead
    WaveCleared {
        /// Wave number
        wave: u32,
    },

    /// An upgrade choice opened (or was rerolled)
    PromptOpened {
        /// Wave that opened it
        wave: u32,
        /// Offered upgrades
        options: [UpgradeKind; 3],
    },

    /// A prompt expired unanswered when the next wave began
    PromptForfeited {
        /// Wave that opened it
        wave: u32,
    },

    /// An upgrade was taken
    UpgradeChosen {
        /// The upgrade
        upgrade: UpgradeKind,
    },

    /// An ability was cast
    AbilityCast {
        /// Caster side
        side: Side,
        /// Ability
        kind: AbilityKind,
        /// Target point
        position: FixedVec2,
        /// Fired by auto-cast rather than a player event
        auto: bool,
    },

    /// A player event was rejected by the current state
    EventDropped {
        /// Event sequence number
        seq: u32,
        /// Why
        reason: DropReason,
    },

    /// The objective took damage
    ObjectiveHit {
        /// Side of the objective
        side: Side,
        /// Health after the hit
        health: Fixed,
    },

    /// The run ended
    RunEnded {
        /// Outcome
        outcome: Outcome,
        /// Score at the end
        score: u32,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Display priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        Self { tick, priority, data }
    }

    /// Create a spawn event.
    pub fn spawned(tick: u32, id: EntityId, kind: CombatantKind, elite: bool) -> Self {
        Self::new(tick, EventPriority::Spawn, GameEventData::Spawned { id, kind, elite })
    }

    /// Create a death event.
    pub fn died(tick: u32, id: EntityId, kind: CombatantKind, killer: Option<EntityId>) -> Self {
        Self::new(tick, EventPriority::Death, GameEventData::Died { id, kind, killer })
    }

    /// Create a progression event (waves, prompts).
    pub fn progression(tick: u32, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::Progression, data)
    }

    /// Create a player action event (abilities, upgrades).
    pub fn player_action(tick: u32, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::PlayerAction, data)
    }

    /// Create a dropped-event notice.
    pub fn dropped(tick: u32, seq: u32, reason: DropReason) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::EventDropped { seq, reason })
    }

    /// Create run ended event.
    pub fn run_ended(tick: u32, outcome: Outcome, score: u32) -> Self {
        Self::new(tick, EventPriority::RunEnded, GameEventData::RunEnded { outcome, score })
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.priority == other.priority
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    // Tick, then priority; ties keep emission order under a stable sort.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
    }
}
