//! Battle Builds
//!
//! Two player builds fight on one field: Home on the left, Away mirrored on
//! the right, no waves and no player events. Everything else is the normal
//! tick pipeline, so a battle is exactly as deterministic as a run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::vec2::FixedVec2;
use crate::core::fixed::Fixed;
use crate::game::config::{Loadout, ProgressionBonuses, SimulationConfig, DEFAULT_TICK_RATE};
use crate::game::error::SimError;
use crate::game::state::{GameMode, Outcome, WorldState, BATTLE_OBJECTIVE_X};
use crate::game::stats::Side;
use crate::game::tick::tick;
use crate::proof::chain::ChainRecorder;

/// One player's side of a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleBuildConfig {
    /// Player who owns the build
    pub owner_id: Uuid,
    /// Structures, units and abilities
    pub loadout: Loadout,
    /// Account bonuses
    pub bonuses: ProgressionBonuses,
}

/// Battle rules and rewards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Battle length in seconds
    pub duration_secs: u32,
    /// Objective health of both sides
    pub objective_health: i32,
    /// Trophies for the winner
    pub trophies_win: i32,
    /// Trophies for the loser (usually negative)
    pub trophies_loss: i32,
    /// Trophies for each side on a draw
    pub trophies_draw: i32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            duration_secs: 90,
            objective_health: 1500,
            trophies_win: 30,
            trophies_loss: -15,
            trophies_draw: 5,
        }
    }
}

impl BattleConfig {
    /// Hard tick limit of a battle.
    pub fn max_ticks(&self) -> u32 {
        self.tick_rate.saturating_mul(self.duration_secs)
    }

    /// Pipeline config for a battle: no waves, no player loadout of its own.
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut config = SimulationConfig {
            tick_rate: self.tick_rate,
            max_waves: 0,
            max_ticks: self.max_ticks(),
            loadout: Loadout::default(),
            ..SimulationConfig::default()
        };
        config.balance.base_health = self.objective_health;
        config
    }
}

/// Why a battle went the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// The loser's objective fell.
    ObjectiveDestroyed,
    /// Time ran out; the winner had more objective health left.
    HigherHealth,
    /// Time ran out with equal health; the winner had more units standing.
    MoreUnits,
    /// Nobody won.
    Draw,
}

/// End state of one side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideReport {
    /// Remaining objective health in whole units
    pub objective_health: i32,
    /// Non-objective combatants still alive
    pub units_alive: u32,
    /// Opposing combatants killed
    pub kills: u32,
    /// Own combatants lost
    pub losses: u32,
    /// Damage dealt in whole units
    pub damage_dealt: i64,
}

/// Result of a simulated battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Raw pipeline outcome
    pub outcome: Outcome,
    /// Winning side, if any
    pub winner: Option<Side>,
    /// How it was decided
    pub reason: WinReason,
    /// Final tick
    pub end_tick: u32,
    /// Chain hash at the final tick
    pub final_hash: u32,
    /// Per-side results, indexed by [`Side::index`]
    pub sides: [SideReport; 2],
}

/// Build the tick-0 battle world. `home` plays left, `away` mirrored right.
pub fn battle_world(
    seed: i32,
    home: &BattleBuildConfig,
    away: &BattleBuildConfig,
    config: &BattleConfig,
) -> Result<WorldState, SimError> {
    let sim_config = config.simulation_config();
    sim_config.validate()?;
    home.loadout.validate()?;
    away.loadout.validate()?;

    let mut world = WorldState::empty(seed, &sim_config, GameMode::Battle);
    let health = Fixed::from_int(config.objective_health);
    let origins = [
        FixedVec2::from_ints(-BATTLE_OBJECTIVE_X, 0),
        FixedVec2::from_ints(BATTLE_OBJECTIVE_X, 0),
    ];
    world.spawn_objective(Side::Home, origins[0], health);
    world.spawn_objective(Side::Away, origins[1], health);
    world.spawn_loadout(Side::Home, origins[0], false, &home.loadout, &home.bonuses, &sim_config)?;
    world.spawn_loadout(Side::Away, origins[1], true, &away.loadout, &away.bonuses, &sim_config)?;
    Ok(world)
}

/// Simulate a battle to the end.
pub fn simulate_battle(
    seed: i32,
    home: &BattleBuildConfig,
    away: &BattleBuildConfig,
    config: &BattleConfig,
) -> Result<BattleReport, SimError> {
    let sim_config = config.simulation_config();
    let mut world = battle_world(seed, home, away, config)?;
    let mut recorder = ChainRecorder::new(sim_config.checkpoint_interval)?;
    recorder.record_world(&world)?;

    let outcome = loop {
        let result = tick(&mut world, &[], &sim_config)?;
        recorder.record_world(&world)?;
        if let Some(outcome) = result.outcome {
            recorder.seal();
            break outcome;
        }
    };

    let final_hash = recorder
        .chain_hash()
        .ok_or(SimError::Invariant("no checkpoint recorded"))?;
    let sides = [side_report(&world, Side::Home), side_report(&world, Side::Away)];
    let (winner, reason) = decide(outcome, &sides);

    Ok(BattleReport {
        outcome,
        winner,
        reason,
        end_tick: world.tick,
        final_hash,
        sides,
    })
}

fn side_report(world: &WorldState, side: Side) -> SideReport {
    let stats = &world.stats[side.index()];
    SideReport {
        objective_health: world.objective_health(side),
        units_alive: world.alive_count(side),
        kills: stats.kills,
        losses: stats.losses,
        damage_dealt: stats.damage_dealt(),
    }
}

/// Winner and reason from the pipeline outcome and the end state.
pub fn decide(outcome: Outcome, sides: &[SideReport; 2]) -> (Option<Side>, WinReason) {
    let (home, away) = (&sides[Side::Home.index()], &sides[Side::Away.index()]);
    match outcome {
        Outcome::Destroyed { winner } => (Some(winner), WinReason::ObjectiveDestroyed),
        Outcome::Timeout => {
            if home.objective_health != away.objective_health {
                let winner = if home.objective_health > away.objective_health { Side::Home } else { Side::Away };
                (Some(winner), WinReason::HigherHealth)
            } else if home.units_alive != away.units_alive {
                let winner = if home.units_alive > away.units_alive { Side::Home } else { Side::Away };
                (Some(winner), WinReason::MoreUnits)
            } else {
                (None, WinReason::Draw)
            }
        }
        Outcome::MutualDestruction | Outcome::Victory | Outcome::Defeat => (None, WinReason::Draw),
    }
}
