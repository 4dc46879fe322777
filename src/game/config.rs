//! Simulation Configuration
//!
//! Everything that affects a run's outcome before tick 0. A config snapshot is
//! created once at issuance, never mutated, and travels with the run record so
//! the replay sees exactly what the client saw.
//!
//! All structures here are fixed-schema (no maps), so the bincode encoding
//! used for [`SimulationConfig::digest`] is canonical.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;
use crate::core::hash::{hash_with_domain, StateHash};
use crate::core::vec2::FixedVec2;
use crate::game::error::SimError;
use crate::game::stats::{AbilityKind, DefenseKind, UnitKind, MAX_LEVEL};

/// Version of the pipeline and its canonical hash format.
///
/// Bump on any change that alters a state hash.
pub const ENGINE_VERSION: u32 = 1;

/// Default simulation rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 30;

/// Default number of waves in a run.
pub const DEFAULT_MAX_WAVES: u32 = 10;

/// Default spacing between retained checkpoints (and audit tick granularity).
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 150;

/// Most ability slots a loadout may carry (event payload range).
pub const MAX_ABILITY_SLOTS: usize = 8;

const MAX_DEFENSES: usize = 32;
const MAX_UNITS: usize = 16;
const MAX_TICK_RATE: u32 = 240;

// =============================================================================
// LOADOUT
// =============================================================================

/// A structure placed before the run starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefensePlacement {
    /// What to build
    pub kind: DefenseKind,
    /// Where, relative to the own objective
    pub position: FixedVec2,
    /// Upgrade level (1-based)
    pub level: u8,
}

/// A unit deployed before the run starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type
    pub kind: UnitKind,
    /// Guard position, relative to the own objective
    pub position: FixedVec2,
    /// Upgrade level (1-based)
    pub level: u8,
}

/// An equipped ability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySlot {
    /// Ability type
    pub kind: AbilityKind,
    /// Fire automatically whenever ready and useful
    pub auto_cast: bool,
}

/// Everything the player brings into a run.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Loadout {
    /// Placed structures
    pub defenses: Vec<DefensePlacement>,
    /// Deployed units
    pub units: Vec<UnitPlacement>,
    /// Equipped abilities, indexed by slot
    pub abilities: Vec<AbilitySlot>,
}

impl Loadout {
    /// The starter loadout: four towers on the cardinal points, a beacon,
    /// two knights, an archer and a mage, every ability on manual cast.
    pub fn starter() -> Self {
        let defense = |kind, x, y| DefensePlacement {
            kind,
            position: FixedVec2::from_ints(x, y),
            level: 1,
        };
        let unit = |kind, x, y| UnitPlacement {
            kind,
            position: FixedVec2::from_ints(x, y),
            level: 1,
        };
        let manual = |kind| AbilitySlot { kind, auto_cast: false };

        Self {
            defenses: vec![
                defense(DefenseKind::ArrowTower, 4, 0),
                defense(DefenseKind::CannonTower, -4, 0),
                defense(DefenseKind::FrostTower, 0, 4),
                defense(DefenseKind::Brazier, 0, -4),
                defense(DefenseKind::Beacon, 3, 3),
            ],
            units: vec![
                unit(UnitKind::Knight, 3, -3),
                unit(UnitKind::Knight, -3, 3),
                unit(UnitKind::Archer, -3, -3),
                unit(UnitKind::Mage, 2, 5),
            ],
            abilities: vec![
                manual(AbilityKind::Meteor),
                manual(AbilityKind::FrostNova),
                manual(AbilityKind::Repair),
            ],
        }
    }

    /// Check sizes, levels and placements.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.defenses.len() > MAX_DEFENSES {
            return Err(SimError::InvalidConfig(format!(
                "{} defenses exceeds limit {}",
                self.defenses.len(),
                MAX_DEFENSES
            )));
        }
        if self.units.len() > MAX_UNITS {
            return Err(SimError::InvalidConfig(format!(
                "{} units exceeds limit {}",
                self.units.len(),
                MAX_UNITS
            )));
        }
        if self.abilities.len() > MAX_ABILITY_SLOTS {
            return Err(SimError::InvalidConfig(format!(
                "{} ability slots exceeds limit {}",
                self.abilities.len(),
                MAX_ABILITY_SLOTS
            )));
        }

        let placements = self
            .defenses
            .iter()
            .map(|d| (d.position, d.level))
            .chain(self.units.iter().map(|u| (u.position, u.level)));
        for (position, level) in placements {
            if level == 0 || level > MAX_LEVEL {
                return Err(SimError::InvalidConfig(format!("level {level} out of range")));
            }
            if !position.is_in_arena() {
                return Err(SimError::InvalidConfig(format!(
                    "placement {position} outside arena"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// BALANCE & PROGRESSION
// =============================================================================

/// Numeric balance knobs supplied by the progression service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceKnobs {
    /// Objective health in whole units
    pub base_health: i32,
    /// Global player damage multiplier (percent)
    pub base_damage_percent: i32,
    /// Intermission before each wave, in ticks
    pub wave_interval_ticks: u32,
    /// Ticks between consecutive spawns in a wave
    pub spawn_spacing_ticks: u32,
    /// Enemies in wave 1
    pub base_wave_size: u32,
    /// Extra enemies per subsequent wave
    pub wave_size_growth: u32,
    /// Enemy health growth per wave (percent)
    pub enemy_health_growth_percent: i32,
    /// First wave that can contain elites
    pub elite_from_wave: u32,
    /// Chance per spawn of an elite (percent)
    pub elite_chance_percent: u32,
    /// Rerolls available on each upgrade prompt
    pub rerolls_per_prompt: u8,
}

impl Default for BalanceKnobs {
    fn default() -> Self {
        Self {
            base_health: 1000,
            base_damage_percent: 100,
            wave_interval_ticks: 300,
            spawn_spacing_ticks: 20,
            base_wave_size: 5,
            wave_size_growth: 2,
            enemy_health_growth_percent: 12,
            elite_from_wave: 3,
            elite_chance_percent: 15,
            rerolls_per_prompt: 1,
        }
    }
}

impl BalanceKnobs {
    /// Number of enemies in a wave (1-based).
    pub fn wave_size(&self, wave: u32) -> u32 {
        self.base_wave_size
            .saturating_add(self.wave_size_growth.saturating_mul(wave.saturating_sub(1)))
    }

    /// Health multiplier for a wave (percent, wave 1 is 100).
    pub fn wave_health_percent(&self, wave: u32) -> i32 {
        let steps = wave.saturating_sub(1).min(i32::MAX as u32) as i32;
        100i32.saturating_add(self.enemy_health_growth_percent.saturating_mul(steps))
    }
}

/// Permanent account bonuses earned outside the run.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressionBonuses {
    /// Extra damage for player units and defenses (percent)
    pub damage_percent: i32,
    /// Extra health for player units and defenses (percent)
    pub health_percent: i32,
    /// Extra rerolls on every prompt
    pub extra_rerolls: u8,
}

/// Content the account has unlocked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlocks {
    /// Unlocked unit types
    pub units: Vec<UnitKind>,
    /// Unlocked defense types
    pub defenses: Vec<DefenseKind>,
    /// Unlocked abilities
    pub abilities: Vec<AbilityKind>,
}

impl Unlocks {
    /// Everything unlocked.
    pub fn all() -> Self {
        Self {
            units: vec![UnitKind::Knight, UnitKind::Archer, UnitKind::Mage],
            defenses: vec![
                DefenseKind::ArrowTower,
                DefenseKind::CannonTower,
                DefenseKind::FrostTower,
                DefenseKind::Brazier,
                DefenseKind::Beacon,
            ],
            abilities: vec![AbilityKind::Meteor, AbilityKind::FrostNova, AbilityKind::Repair],
        }
    }

    /// First piece of the loadout that is not unlocked, if any.
    pub fn first_locked(&self, loadout: &Loadout) -> Option<String> {
        if let Some(d) = loadout.defenses.iter().find(|d| !self.defenses.contains(&d.kind)) {
            return Some(format!("{:?}", d.kind));
        }
        if let Some(u) = loadout.units.iter().find(|u| !self.units.contains(&u.kind)) {
            return Some(format!("{:?}", u.kind));
        }
        loadout
            .abilities
            .iter()
            .find(|a| !self.abilities.contains(&a.kind))
            .map(|a| format!("{:?}", a.kind))
    }
}

// =============================================================================
// SIMULATION CONFIG
// =============================================================================

/// Immutable per-run configuration snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Pipeline version this snapshot was issued for
    pub engine_version: u32,
    /// Ticks per second
    pub tick_rate: u32,
    /// Waves to clear for victory (zero for battles)
    pub max_waves: u32,
    /// Hard tick limit; reaching it is a timeout
    pub max_ticks: u32,
    /// Retained checkpoint spacing
    pub checkpoint_interval: u32,
    /// Balance knobs
    pub balance: BalanceKnobs,
    /// Player loadout
    pub loadout: Loadout,
    /// Account bonuses
    pub bonuses: ProgressionBonuses,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engine_version: ENGINE_VERSION,
            tick_rate: DEFAULT_TICK_RATE,
            max_waves: DEFAULT_MAX_WAVES,
            // 15 minutes of play
            max_ticks: DEFAULT_TICK_RATE * 900,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            balance: BalanceKnobs::default(),
            loadout: Loadout::starter(),
            bonuses: ProgressionBonuses::default(),
        }
    }
}

impl SimulationConfig {
    /// Check that the snapshot can be simulated.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(SimError::InvalidConfig(format!("tick rate {}", self.tick_rate)));
        }
        if self.max_ticks == 0 {
            return Err(SimError::InvalidConfig("max_ticks is zero".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(SimError::InvalidConfig("checkpoint_interval is zero".into()));
        }
        if self.balance.base_health <= 0 {
            return Err(SimError::InvalidConfig("base_health must be positive".into()));
        }
        if self.balance.wave_interval_ticks == 0 || self.balance.spawn_spacing_ticks == 0 {
            return Err(SimError::InvalidConfig("wave timing must be positive".into()));
        }
        self.loadout.validate()
    }

    /// Last tick at which waves can still be starting: the window audit
    /// ticks are drawn from.
    pub fn audit_horizon(&self) -> u32 {
        self.balance
            .wave_interval_ticks
            .saturating_mul(self.max_waves)
            .min(self.max_ticks)
    }

    /// Rerolls available on each prompt, including bonuses.
    pub fn rerolls_per_prompt(&self) -> u8 {
        self.balance
            .rerolls_per_prompt
            .saturating_add(self.bonuses.extra_rerolls)
    }

    /// Objective health as a fixed-point value.
    pub fn base_health(&self) -> Fixed {
        Fixed::from_int(self.balance.base_health)
    }

    /// SHA-256 over the canonical bincode encoding.
    pub fn digest(&self) -> Result<StateHash, SimError> {
        let bytes = bincode::serialize(self)
            .map_err(|e| SimError::InvalidConfig(format!("config encoding failed: {e}")))?;
        Ok(hash_with_domain(b"BASTION_CONFIG_V1", &bytes))
    }

    /// Hex form of [`digest`](Self::digest), as carried in run credentials.
    pub fn digest_hex(&self) -> Result<String, SimError> {
        self.digest().map(hex::encode)
    }
}
