//! World State Definitions
//!
//! All state types for the combat simulation. Plain data: subsystems in the
//! tick pipeline mutate these records in place, nothing here schedules work.
//! Uses BTreeMap for deterministic iteration order.
//!
//! Entities are only ever removed by [`WorldState::sweep`], which runs once at
//! the end of every tick, so every subsystem sees the same entity set.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{ms_to_ticks, Fixed};
use crate::core::hash::{compute_state_hash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::config::{Loadout, ProgressionBonuses, SimulationConfig};
use crate::game::error::SimError;
use crate::game::stats::{
    ability_profile, base_stats, level_percent, AbilityKind, AttackProfile, AuraProfile,
    CombatantKind, DamageType, Side, StatusKind, UnitKind, UpgradeKind, ELITE_BOUNTY_MULT,
    ELITE_DAMAGE_PERCENT, ELITE_HEALTH_PERCENT,
};

// =============================================================================
// ENTITY ID
// =============================================================================

/// Stable entity identifier, allocated from one monotonic counter.
///
/// Creation order equals id order, which is the processing order of every
/// subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Objective body radius: attackers measure range to its edge.
pub const OBJECTIVE_RADIUS: Fixed = Fixed::from_int(2);

/// Where a side's objective stands in a battle.
pub const BATTLE_OBJECTIVE_X: i32 = 20;

// =============================================================================
// STATUS & COMBO
// =============================================================================

/// Active burn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burn {
    /// Ticks left
    pub remaining: u32,
    /// Ticks since applied (pulses every period)
    pub elapsed: u32,
}

/// Active slow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slow {
    /// Ticks left
    pub remaining: u32,
    /// Speed reduction (percent)
    pub percent: i32,
}

/// Status effects on one combatant. One instance per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSet {
    /// Periodic fire damage
    pub burn: Option<Burn>,
    /// Movement slow
    pub slow: Option<Slow>,
    /// Damage-taken amplification, ticks left
    pub mark: Option<u32>,
}

impl StatusSet {
    /// Is a status of this kind active?
    pub fn has(&self, kind: StatusKind) -> bool {
        match kind {
            StatusKind::Burn => self.burn.is_some(),
            StatusKind::Slow => self.slow.is_some(),
            StatusKind::Mark => self.mark.is_some(),
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        match self.burn {
            Some(b) => {
                hasher.update_u8(1);
                hasher.update_u32(b.remaining);
                hasher.update_u32(b.elapsed);
            }
            None => hasher.update_u8(0),
        }
        match self.slow {
            Some(s) => {
                hasher.update_u8(1);
                hasher.update_u32(s.remaining);
                hasher.update_i32(s.percent);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_opt_u32(self.mark);
    }
}

/// Consecutive hits by one attacker on one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    /// Current target of the chain
    pub target: EntityId,
    /// Stacks (0 on the first hit)
    pub stacks: u8,
    /// Tick of the last counted hit
    pub last_hit_tick: u32,
}

// =============================================================================
// COMBATANT
// =============================================================================

/// Resolved attack stats of one combatant (level, elite and bonuses applied).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackState {
    /// Damage per hit
    pub damage: Fixed,
    /// Attack range
    pub range: Fixed,
    /// Ticks between attacks
    pub cooldown_ticks: u32,
    /// Ticks until the next attack is allowed
    pub cooldown_remaining: u32,
    /// Projectile step per tick (zero = instant)
    pub projectile_step: Fixed,
    /// Element
    pub damage_type: DamageType,
    /// Splash radius
    pub splash_radius: Fixed,
    /// Crit chance (percent)
    pub crit_percent: u32,
    /// Status applied on hit
    pub on_hit: Option<StatusKind>,
}

/// Any unit, defense, enemy or objective on the field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Stable id
    pub id: EntityId,
    /// Owning side
    pub side: Side,
    /// What this is
    pub kind: CombatantKind,
    /// Level (1-based)
    pub level: u8,
    /// Elite enemy?
    pub elite: bool,
    /// Current position
    pub position: FixedVec2,
    /// Guard point units return to when idle
    pub anchor: FixedVec2,
    /// Attackers measure range to this radius around the position
    pub body_radius: Fixed,
    /// Current health
    pub health: Fixed,
    /// Maximum health
    pub max_health: Fixed,
    /// Movement step per tick before slows
    pub speed_step: Fixed,
    /// Attack, if any
    pub attack: Option<AttackState>,
    /// Aura emitted, if any
    pub aura: Option<AuraProfile>,
    /// Aura damage bonus received this tick (percent, recomputed every tick)
    pub aura_bonus: i32,
    /// Element this takes extra damage from
    pub weakness: Option<DamageType>,
    /// Resources granted when killed
    pub bounty: u32,
    /// Current target
    pub target: Option<EntityId>,
    /// Active statuses
    pub statuses: StatusSet,
    /// Combo chain
    pub combo: Option<Combo>,
    /// Still alive this tick?
    pub alive: bool,
}

impl Combatant {
    /// Can this combatant be targeted and damaged?
    #[inline]
    pub fn is_targetable(&self) -> bool {
        self.alive
    }

    /// Movement step this tick after slows.
    pub fn effective_step(&self) -> Fixed {
        match self.statuses.slow {
            Some(slow) => self.speed_step.mul_percent(100 - slow.percent.clamp(0, 100)),
            None => self.speed_step,
        }
    }

    /// Health as a rounded-down whole number, never negative.
    pub fn health_floor(&self) -> i32 {
        self.health.to_int_floor().max(0)
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_u8(self.side as u8);
        hasher.update_u8(self.kind.code());
        hasher.update_u8(self.level);
        hasher.update_bool(self.elite);
        hasher.update_vec2(self.position);
        hasher.update_vec2(self.anchor);
        hasher.update_fixed(self.health);
        hasher.update_fixed(self.max_health);
        hasher.update_fixed(self.speed_step);
        match &self.attack {
            Some(a) => {
                hasher.update_u8(1);
                hasher.update_fixed(a.damage);
                hasher.update_fixed(a.range);
                hasher.update_u32(a.cooldown_ticks);
                hasher.update_u32(a.cooldown_remaining);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_i32(self.aura_bonus);
        hasher.update_opt_u32(self.target.map(|t| t.0));
        self.statuses.hash_into(hasher);
        match self.combo {
            Some(c) => {
                hasher.update_u8(1);
                hasher.update_u32(c.target.0);
                hasher.update_u8(c.stacks);
                hasher.update_u32(c.last_hit_tick);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_bool(self.alive);
    }
}

/// Parameters for spawning a non-objective combatant.
#[derive(Clone, Copy, Debug)]
pub struct SpawnSpec {
    /// Owning side
    pub side: Side,
    /// Kind (must not be the objective)
    pub kind: CombatantKind,
    /// Level (1-based)
    pub level: u8,
    /// Spawn (and anchor) position
    pub position: FixedVec2,
    /// Elite enemy?
    pub elite: bool,
    /// Extra health multiplier (percent)
    pub health_percent: i32,
    /// Extra damage multiplier (percent)
    pub damage_percent: i32,
}

impl SpawnSpec {
    /// Plain spec with neutral multipliers.
    pub fn new(side: Side, kind: CombatantKind, level: u8, position: FixedVec2) -> Self {
        Self {
            side,
            kind,
            level,
            position,
            elite: false,
            health_percent: 100,
            damage_percent: 100,
        }
    }
}

// =============================================================================
// PROJECTILES & ZONES
// =============================================================================

/// A homing projectile in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Stable id (shares the entity counter)
    pub id: EntityId,
    /// Side of the shooter
    pub side: Side,
    /// Shooter
    pub source: EntityId,
    /// Homing target
    pub target: EntityId,
    /// Current position
    pub position: FixedVec2,
    /// Step per tick
    pub step: Fixed,
    /// Damage on impact (crit already applied)
    pub damage: Fixed,
    /// Element
    pub damage_type: DamageType,
    /// Splash radius
    pub splash_radius: Fixed,
    /// Status applied on impact
    pub on_hit: Option<StatusKind>,
    /// Was this a crit?
    pub crit: bool,
    /// Still in flight?
    pub alive: bool,
}

/// Area effects left on the field by abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Delayed impact.
    Meteor {
        /// Ticks until impact
        delay: u32,
        /// Damage dealt to every enemy in radius
        damage: Fixed,
    },
    /// Persistent slow field.
    FrostField {
        /// Ticks left
        remaining: u32,
        /// Slow strength (percent)
        slow_percent: i32,
    },
}

/// An area effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Stable id (shares the entity counter)
    pub id: EntityId,
    /// Side that cast it; affects the opposing side
    pub side: Side,
    /// Center
    pub position: FixedVec2,
    /// Radius
    pub radius: Fixed,
    /// Behavior
    pub kind: ZoneKind,
    /// Still active?
    pub active: bool,
}

// =============================================================================
// ABILITIES, WAVES, PROMPTS
// =============================================================================

/// An equipped ability and its cooldown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityState {
    /// Owner
    pub side: Side,
    /// Slot index within the owner's loadout
    pub slot: u8,
    /// Ability
    pub kind: AbilityKind,
    /// Fire automatically in the cooldown step
    pub auto_cast: bool,
    /// Ticks until ready
    pub cooldown_remaining: u32,
}

impl AbilityState {
    /// Ready to cast?
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining == 0
    }
}

/// Wave progression phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavePhase {
    /// Counting down to the next wave.
    Intermission {
        /// Ticks until the wave starts
        remaining: u32,
    },
    /// Enemies still arriving.
    Spawning {
        /// Enemies left to spawn
        left: u32,
        /// Ticks until the next spawn
        next_in: u32,
    },
    /// All enemies out; waiting for them to die.
    Clearing,
    /// No more waves.
    Finished,
}

/// Wave bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveState {
    /// Current wave number (0 before the first wave)
    pub number: u32,
    /// Phase
    pub phase: WavePhase,
    /// Waves fully cleared
    pub cleared: u32,
}

impl WaveState {
    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.number);
        hasher.update_u32(self.cleared);
        match self.phase {
            WavePhase::Intermission { remaining } => {
                hasher.update_u8(0);
                hasher.update_u32(remaining);
            }
            WavePhase::Spawning { left, next_in } => {
                hasher.update_u8(1);
                hasher.update_u32(left);
                hasher.update_u32(next_in);
            }
            WavePhase::Clearing => hasher.update_u8(2),
            WavePhase::Finished => hasher.update_u8(3),
        }
    }
}

/// An open upgrade choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePrompt {
    /// Wave whose clear opened this prompt
    pub wave: u32,
    /// The three offered upgrades
    pub options: [UpgradeKind; 3],
    /// Rerolls left on this prompt
    pub rerolls_left: u8,
}

/// Upgrade stacks taken so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrades {
    counts: [u32; 5],
}

impl Upgrades {
    /// Stacks of an upgrade.
    #[inline]
    pub fn count(&self, kind: UpgradeKind) -> u32 {
        self.counts[kind as usize]
    }

    /// Add one stack.
    #[inline]
    pub fn add(&mut self, kind: UpgradeKind) {
        let slot = &mut self.counts[kind as usize];
        *slot = slot.saturating_add(1);
    }

    /// Total stacks.
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

// =============================================================================
// OUTCOME & STATS
// =============================================================================

/// Terminal outcome of a run or battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Defense: the final wave was cleared.
    Victory,
    /// Defense: the objective fell.
    Defeat,
    /// The tick limit was reached.
    Timeout,
    /// Battle: exactly one objective fell.
    Destroyed {
        /// Side whose objective still stands
        winner: Side,
    },
    /// Battle: both objectives fell in the same tick.
    MutualDestruction,
}

impl Outcome {
    fn code(self) -> u8 {
        match self {
            Outcome::Victory => 1,
            Outcome::Defeat => 2,
            Outcome::Timeout => 3,
            Outcome::Destroyed { winner: Side::Home } => 4,
            Outcome::Destroyed { winner: Side::Away } => 5,
            Outcome::MutualDestruction => 6,
        }
    }
}

/// Running per-side tallies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideStats {
    /// Opposing combatants killed
    pub kills: u32,
    /// Elite enemies killed
    pub elite_kills: u32,
    /// Resources earned from bounties
    pub resources: u32,
    /// Own units and defenses lost
    pub losses: u32,
    /// Damage dealt, raw Q16.16 summed in 64 bits
    pub damage_raw: i64,
}

impl SideStats {
    /// Damage dealt in whole units.
    pub fn damage_dealt(&self) -> i64 {
        self.damage_raw >> 16
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.kills);
        hasher.update_u32(self.elite_kills);
        hasher.update_u32(self.resources);
        hasher.update_u32(self.losses);
        hasher.update_u64(self.damage_raw as u64);
    }
}

/// What kind of match the world is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Single-player wave defense.
    Defense,
    /// Two builds against each other; no waves.
    Battle,
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// Complete mutable state of one run.
///
/// Owned by exactly one pipeline; never shared across runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Canonical hash format version
    pub engine_version: u32,
    /// Run seed
    pub seed: i32,
    /// Current tick (0 = initial state)
    pub tick: u32,
    /// Match kind
    pub mode: GameMode,
    /// The single random stream of this run
    pub rng: DeterministicRng,
    /// Next id to allocate
    pub next_id: u32,
    /// Units, defenses, enemies and objectives by id
    pub combatants: BTreeMap<EntityId, Combatant>,
    /// Projectiles in flight by id
    pub projectiles: BTreeMap<EntityId, Projectile>,
    /// Area effects in creation order
    pub zones: Vec<Zone>,
    /// Equipped abilities, Home slots first
    pub abilities: Vec<AbilityState>,
    /// Objective of each side, if it has one
    pub objectives: [Option<EntityId>; 2],
    /// Wave progression (Defense mode)
    pub waves: WaveState,
    /// Open upgrade choice
    pub prompt: Option<ChoicePrompt>,
    /// Upgrades taken
    pub upgrades: Upgrades,
    /// Prompts that expired unanswered
    pub prompts_forfeited: u32,
    /// Per-side tallies
    pub stats: [SideStats; 2],
    /// Player events applied
    pub events_applied: u32,
    /// Player events dropped as invalid for the current state
    pub events_dropped: u32,
    /// Set once the run is over
    pub outcome: Option<Outcome>,
}

impl WorldState {
    /// Create an empty world. Entities are added by the `spawn_*` helpers.
    pub fn empty(seed: i32, config: &SimulationConfig, mode: GameMode) -> Self {
        let first_wave = config.balance.wave_interval_ticks;
        Self {
            engine_version: config.engine_version,
            seed,
            tick: 0,
            mode,
            rng: DeterministicRng::from_run_seed(seed),
            next_id: 1,
            combatants: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            zones: Vec::new(),
            abilities: Vec::new(),
            objectives: [None, None],
            waves: WaveState {
                number: 0,
                phase: match mode {
                    GameMode::Defense => WavePhase::Intermission { remaining: first_wave },
                    GameMode::Battle => WavePhase::Finished,
                },
                cleared: 0,
            },
            prompt: None,
            upgrades: Upgrades::default(),
            prompts_forfeited: 0,
            stats: [SideStats::default(); 2],
            events_applied: 0,
            events_dropped: 0,
            outcome: None,
        }
    }

    /// Create the tick-0 world of a defense run: objective at the origin,
    /// then the loadout in declaration order.
    pub fn new_run(seed: i32, config: &SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        if config.max_waves == 0 {
            return Err(SimError::InvalidConfig("a defense run needs at least one wave".into()));
        }
        let mut world = Self::empty(seed, config, GameMode::Defense);
        world.spawn_objective(Side::Home, FixedVec2::ZERO, config.base_health());
        world.spawn_loadout(Side::Home, FixedVec2::ZERO, false, &config.loadout, &config.bonuses, config)?;
        Ok(world)
    }

    /// Allocate the next entity id.
    pub fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place a side's objective.
    pub fn spawn_objective(&mut self, side: Side, position: FixedVec2, health: Fixed) -> EntityId {
        let id = self.alloc_id();
        self.combatants.insert(
            id,
            Combatant {
                id,
                side,
                kind: CombatantKind::Objective,
                level: 1,
                elite: false,
                position,
                anchor: position,
                body_radius: OBJECTIVE_RADIUS,
                health,
                max_health: health,
                speed_step: Fixed::ZERO,
                attack: None,
                aura: None,
                aura_bonus: 0,
                weakness: None,
                bounty: 0,
                target: None,
                statuses: StatusSet::default(),
                combo: None,
                alive: true,
            },
        );
        self.objectives[side.index()] = Some(id);
        id
    }

    /// Spawn every defense, unit and ability of a loadout.
    ///
    /// Positions are relative to `origin`; `mirror` flips them across the
    /// vertical axis (the Away side of a battle).
    pub fn spawn_loadout(
        &mut self,
        side: Side,
        origin: FixedVec2,
        mirror: bool,
        loadout: &Loadout,
        bonuses: &ProgressionBonuses,
        config: &SimulationConfig,
    ) -> Result<(), SimError> {
        let place = |offset: FixedVec2| {
            let offset = if mirror { offset.mirror_x() } else { offset };
            (origin + offset).clamp_to_arena()
        };
        let health_percent = 100 + bonuses.health_percent;
        let damage_percent = 100 + bonuses.damage_percent;

        for defense in &loadout.defenses {
            let spec = SpawnSpec {
                health_percent,
                damage_percent,
                ..SpawnSpec::new(side, CombatantKind::Defense(defense.kind), defense.level, place(defense.position))
            };
            self.spawn_combatant(spec, config)?;
        }
        for unit in &loadout.units {
            let spec = SpawnSpec {
                health_percent,
                damage_percent,
                ..SpawnSpec::new(side, CombatantKind::Unit(unit.kind), unit.level, place(unit.position))
            };
            self.spawn_combatant(spec, config)?;
        }
        for (slot, ability) in loadout.abilities.iter().enumerate() {
            self.abilities.push(AbilityState {
                side,
                slot: slot as u8,
                kind: ability.kind,
                auto_cast: ability.auto_cast,
                cooldown_remaining: 0,
            });
        }
        Ok(())
    }

    /// Spawn a unit, defense or enemy with fully resolved stats.
    pub fn spawn_combatant(
        &mut self,
        spec: SpawnSpec,
        config: &SimulationConfig,
    ) -> Result<EntityId, SimError> {
        let base = base_stats(spec.kind)
            .ok_or(SimError::Invariant("objective spawned through spawn_combatant"))?;
        let tick_rate = config.tick_rate;

        let level = level_percent(spec.level);
        let (elite_health, elite_damage, elite_bounty) = if spec.elite {
            (ELITE_HEALTH_PERCENT, ELITE_DAMAGE_PERCENT, ELITE_BOUNTY_MULT)
        } else {
            (100, 100, 1)
        };

        let max_health = base
            .max_health
            .mul_percent(level)
            .mul_percent(spec.health_percent)
            .mul_percent(elite_health);
        let speed_step = base
            .speed
            .checked_div_int(tick_rate as i32)
            .ok_or(SimError::DivideByZero("speed step"))?;

        let attack = match base.attack {
            Some(profile) => Some(resolve_attack(
                &profile,
                level,
                spec.damage_percent,
                elite_damage,
                tick_rate,
            )?),
            None => None,
        };

        let id = self.alloc_id();
        self.combatants.insert(
            id,
            Combatant {
                id,
                side: spec.side,
                kind: spec.kind,
                level: spec.level,
                elite: spec.elite,
                position: spec.position,
                anchor: spec.position,
                body_radius: Fixed::ZERO,
                health: max_health,
                max_health,
                speed_step,
                attack,
                aura: base.aura,
                aura_bonus: 0,
                weakness: base.weakness,
                bounty: base.bounty.saturating_mul(elite_bounty),
                target: None,
                statuses: StatusSet::default(),
                combo: None,
                alive: true,
            },
        );
        Ok(id)
    }

    /// Spawn a reinforcement knight beside a side's objective.
    pub fn spawn_reinforcement(&mut self, side: Side, config: &SimulationConfig) -> Result<EntityId, SimError> {
        let objective = self.objective(side)?;
        let offset = match side {
            Side::Home => FixedVec2::from_ints(0, -3),
            Side::Away => FixedVec2::from_ints(0, 3),
        };
        let position = (objective.position + offset).clamp_to_arena();
        let bonuses = &config.bonuses;
        let spec = SpawnSpec {
            health_percent: 100 + bonuses.health_percent,
            damage_percent: 100 + bonuses.damage_percent,
            ..SpawnSpec::new(side, CombatantKind::Unit(UnitKind::Knight), 1, position)
        };
        self.spawn_combatant(spec, config)
    }

    /// Look up a combatant; a missing id is a defect.
    pub fn combatant(&self, id: EntityId) -> Result<&Combatant, SimError> {
        self.combatants.get(&id).ok_or(SimError::UnknownEntity(id))
    }

    /// Look up a combatant mutably; a missing id is a defect.
    pub fn combatant_mut(&mut self, id: EntityId) -> Result<&mut Combatant, SimError> {
        self.combatants.get_mut(&id).ok_or(SimError::UnknownEntity(id))
    }

    /// A side's objective.
    pub fn objective(&self, side: Side) -> Result<&Combatant, SimError> {
        let id = self.objectives[side.index()]
            .ok_or(SimError::Invariant("side has no objective"))?;
        self.combatant(id)
    }

    /// Is this side's objective still standing? Sides without one count as standing.
    pub fn objective_alive(&self, side: Side) -> bool {
        match self.objectives[side.index()] {
            Some(id) => self.combatants.get(&id).is_some_and(|c| c.alive),
            None => true,
        }
    }

    /// Remaining objective health in whole units (0 if missing or dead).
    pub fn objective_health(&self, side: Side) -> i32 {
        self.objectives[side.index()]
            .and_then(|id| self.combatants.get(&id))
            .map(|c| if c.alive { c.health_floor() } else { 0 })
            .unwrap_or(0)
    }

    /// Living non-objective combatants of a side.
    pub fn alive_count(&self, side: Side) -> u32 {
        self.combatants
            .values()
            .filter(|c| c.side == side && c.alive && c.kind != CombatantKind::Objective)
            .count() as u32
    }

    /// Living enemies (Away combatants) in Defense mode.
    pub fn enemies_alive(&self) -> u32 {
        self.combatants
            .values()
            .filter(|c| c.alive && matches!(c.kind, CombatantKind::Enemy(_)))
            .count() as u32
    }

    /// Is the run over?
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.outcome.is_some()
    }

    /// Score of the run so far.
    ///
    /// kills x10 + elite kills x40 + waves cleared x100, plus on victory
    /// 200 and the remaining objective health.
    pub fn score(&self) -> u32 {
        let home = &self.stats[Side::Home.index()];
        let mut score = home
            .kills
            .saturating_mul(10)
            .saturating_add(home.elite_kills.saturating_mul(40))
            .saturating_add(self.waves.cleared.saturating_mul(100));
        if self.outcome == Some(Outcome::Victory) {
            let remaining = self.objective_health(Side::Home).max(0) as u32;
            score = score.saturating_add(200).saturating_add(remaining);
        }
        score
    }

    /// End-of-tick removal of everything that died or expired this tick.
    ///
    /// Dangling targets, combos and projectiles aimed at removed combatants
    /// are cleared in the same pass. Objectives stay so their final health
    /// remains observable.
    pub fn sweep(&mut self) {
        self.combatants
            .retain(|_, c| c.alive || c.kind == CombatantKind::Objective);

        let combatants = &self.combatants;
        let live = |id: &EntityId| combatants.get(id).is_some_and(|c| c.alive);

        self.projectiles.retain(|_, p| p.alive && live(&p.target));
        self.zones.retain(|z| z.active);

        let dead_refs: Vec<(EntityId, bool, bool)> = self
            .combatants
            .values()
            .map(|c| {
                let target_gone = c.target.is_some_and(|t| !live(&t));
                let combo_gone = c.combo.is_some_and(|k| !live(&k.target));
                (c.id, target_gone, combo_gone)
            })
            .collect();
        for (id, target_gone, combo_gone) in dead_refs {
            if let Some(c) = self.combatants.get_mut(&id) {
                if target_gone {
                    c.target = None;
                }
                if combo_gone {
                    c.combo = None;
                }
            }
        }
    }

    /// Canonical 32-bit hash of the whole world.
    ///
    /// Fixed field order, integers and fixed-point only, collections walked
    /// in id order with a length prefix.
    pub fn compute_hash(&self) -> u32 {
        compute_state_hash(self.engine_version, self.tick, self.seed, |hasher| {
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);
            hasher.update_u8(self.mode as u8);
            hasher.update_u32(self.next_id);

            hasher.update_len(self.combatants.len());
            for combatant in self.combatants.values() {
                combatant.hash_into(hasher);
            }

            hasher.update_len(self.projectiles.len());
            for p in self.projectiles.values() {
                hasher.update_u32(p.id.0);
                hasher.update_u32(p.source.0);
                hasher.update_u32(p.target.0);
                hasher.update_vec2(p.position);
                hasher.update_fixed(p.damage);
                hasher.update_bool(p.crit);
            }

            hasher.update_len(self.zones.len());
            for zone in &self.zones {
                hasher.update_u32(zone.id.0);
                hasher.update_u8(zone.side as u8);
                hasher.update_vec2(zone.position);
                hasher.update_fixed(zone.radius);
                match zone.kind {
                    ZoneKind::Meteor { delay, damage } => {
                        hasher.update_u8(0);
                        hasher.update_u32(delay);
                        hasher.update_fixed(damage);
                    }
                    ZoneKind::FrostField { remaining, slow_percent } => {
                        hasher.update_u8(1);
                        hasher.update_u32(remaining);
                        hasher.update_i32(slow_percent);
                    }
                }
            }

            hasher.update_len(self.abilities.len());
            for ability in &self.abilities {
                hasher.update_u8(ability.side as u8);
                hasher.update_u8(ability.slot);
                hasher.update_u8(ability.kind as u8);
                hasher.update_bool(ability.auto_cast);
                hasher.update_u32(ability.cooldown_remaining);
            }

            self.waves.hash_into(hasher);
            match &self.prompt {
                Some(prompt) => {
                    hasher.update_u8(1);
                    hasher.update_u32(prompt.wave);
                    for option in prompt.options {
                        hasher.update_u8(option as u8);
                    }
                    hasher.update_u8(prompt.rerolls_left);
                }
                None => hasher.update_u8(0),
            }
            for kind in UpgradeKind::ALL {
                hasher.update_u32(self.upgrades.count(kind));
            }
            hasher.update_u32(self.prompts_forfeited);

            for stats in &self.stats {
                stats.hash_into(hasher);
            }
            hasher.update_u32(self.events_applied);
            hasher.update_u32(self.events_dropped);
            hasher.update_u8(self.outcome.map_or(0, Outcome::code));
        })
    }
}

fn resolve_attack(
    profile: &AttackProfile,
    level_percent: i32,
    damage_percent: i32,
    elite_percent: i32,
    tick_rate: u32,
) -> Result<AttackState, SimError> {
    let projectile_step = profile
        .projectile_speed
        .checked_div_int(tick_rate as i32)
        .ok_or(SimError::DivideByZero("projectile step"))?;
    Ok(AttackState {
        damage: profile
            .damage
            .mul_percent(level_percent)
            .mul_percent(damage_percent)
            .mul_percent(elite_percent),
        range: profile.range,
        cooldown_ticks: ms_to_ticks(profile.cooldown_ms, tick_rate),
        cooldown_remaining: 0,
        projectile_step,
        damage_type: profile.damage_type,
        splash_radius: profile.splash_radius,
        crit_percent: profile.crit_percent,
        on_hit: profile.on_hit,
    })
}

/// Cooldown of an ability in ticks.
pub fn ability_cooldown_ticks(kind: AbilityKind, tick_rate: u32) -> u32 {
    ms_to_ticks(ability_profile(kind).cooldown_ms, tick_rate)
}

// =============================================================================
// TESTS
// =============================================================================
