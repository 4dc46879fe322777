//! Authoritative Simulation Tick
//!
//! The core game loop that must be 100% deterministic.
//! This is what the run verifier replays.
//!
//! ## Pipeline
//!
//! Every tick runs the same nine steps in the same order, then sweeps:
//!
//! 1. Player events scheduled for this tick, in `seq` order
//! 2. Target acquisition
//! 3. Movement
//! 4. Attacks (instant hits queued, projectiles launched)
//! 5. Projectiles (impacts queued)
//! 6. Auras, damage modifiers, statuses, zones
//! 7. Damage application and deaths
//! 8. Wave progression, then the outcome check
//! 9. Cooldowns and auto-cast
//!
//! Hits are never applied before step 7, so the order of attackers within
//! steps 4 and 5 does not change who dies.

use crate::game::ability;
use crate::game::action::{apply_event, DroppedEvent, PlayerEvent};
use crate::game::combat;
use crate::game::config::SimulationConfig;
use crate::game::damage::{self, Hit};
use crate::game::effects;
use crate::game::error::SimError;
use crate::game::events::GameEvent;
use crate::game::movement;
use crate::game::state::{GameMode, Outcome, WavePhase, WorldState};
use crate::game::stats::Side;
use crate::game::targeting;
use crate::game::waves;

/// Scratch state threaded through the steps of one tick.
///
/// Never outlives the tick and is never hashed.
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Configuration snapshot of the run
    pub config: &'a SimulationConfig,
    /// Damage queued for step 7
    pub hits: Vec<Hit>,
    /// Events emitted so far
    pub events: Vec<GameEvent>,
    /// Player events dropped in step 1
    pub dropped: Vec<DroppedEvent>,
}

impl<'a> TickContext<'a> {
    /// Empty context for one tick.
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self {
            config,
            hits: Vec::new(),
            events: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, in display order
    pub events: Vec<GameEvent>,
    /// Player events dropped this tick
    pub dropped: Vec<DroppedEvent>,
    /// Set on the tick the run ends
    pub outcome: Option<Outcome>,
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `world` - The world state (will be mutated)
/// * `events` - Player events scheduled for this tick, in `seq` order
/// * `config` - The run's configuration snapshot
///
/// # Determinism
///
/// This function is 100% deterministic:
/// - Uses BTreeMap for iteration order
/// - Uses fixed-point math only
/// - Uses deterministic RNG (world.rng)
/// - No system calls, no floating point
///
/// # Errors
///
/// [`SimError::RunEnded`] if the run already has an outcome; any other error
/// is a defect and leaves the world mid-tick.
pub fn tick(
    world: &mut WorldState,
    events: &[PlayerEvent],
    config: &SimulationConfig,
) -> Result<TickResult, SimError> {
    if world.outcome.is_some() {
        return Err(SimError::RunEnded(world.tick));
    }
    let mut ctx = TickContext::new(config);

    // 0. Advance tick counter
    world.tick += 1;

    // 1. Apply player events
    for event in events {
        apply_event(world, event, &mut ctx)?;
    }

    // 2. Pick targets
    targeting::acquire_targets(world)?;

    // 3. Move
    movement::move_combatants(world)?;

    // 4. Attack
    combat::resolve_attacks(world, &mut ctx)?;

    // 5. Fly projectiles
    combat::advance_projectiles(world, &mut ctx)?;

    // 6. Modifiers, statuses and zones
    effects::apply_effects(world, &mut ctx)?;

    // 7. Apply damage, settle deaths
    damage::resolve_damage(world, &mut ctx)?;

    // 8. Waves, then the outcome check
    waves::progress(world, &mut ctx)?;
    if let Some(outcome) = check_outcome(world, config) {
        world.outcome = Some(outcome);
        ctx.events.push(GameEvent::run_ended(world.tick, outcome, world.score()));
    }

    // 9. Cooldowns and auto-cast
    ability::tick_cooldowns(world, &mut ctx)?;

    world.sweep();

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(
        tick = world.tick,
        hash = world.compute_hash(),
        combatants = world.combatants.len(),
        projectiles = world.projectiles.len(),
        "tick complete"
    );

    let TickContext { mut events, dropped, .. } = ctx;
    events.sort();
    Ok(TickResult { events, dropped, outcome: world.outcome })
}

/// Decide whether the run is over after step 8.
///
/// Defense precedence: defeat, then victory, then timeout. A battle ends
/// when either objective falls or time runs out.
pub fn check_outcome(world: &WorldState, config: &SimulationConfig) -> Option<Outcome> {
    let timed_out = world.tick >= config.max_ticks;
    match world.mode {
        GameMode::Defense => {
            if !world.objective_alive(Side::Home) {
                Some(Outcome::Defeat)
            } else if world.waves.phase == WavePhase::Finished && world.waves.cleared >= config.max_waves {
                Some(Outcome::Victory)
            } else if timed_out {
                Some(Outcome::Timeout)
            } else {
                None
            }
        }
        GameMode::Battle => {
            let home = world.objective_alive(Side::Home);
            let away = world.objective_alive(Side::Away);
            match (home, away) {
                (false, false) => Some(Outcome::MutualDestruction),
                (true, false) => Some(Outcome::Destroyed { winner: Side::Home }),
                (false, true) => Some(Outcome::Destroyed { winner: Side::Away }),
                (true, true) if timed_out => Some(Outcome::Timeout),
                (true, true) => None,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::Fixed;
    use crate::game::action::{DropReason, PlayerAction};
    use crate::game::events::GameEventData;

    fn run_world(seed: i32, config: &SimulationConfig) -> WorldState {
        WorldState::new_run(seed, config).expect("valid config")
    }

    #[test]
    fn test_tick_advances() {
        let config = SimulationConfig::default();
        let mut world = run_world(12345, &config);
        assert_eq!(world.tick, 0);

        tick(&mut world, &[], &config).expect("tick");
        assert_eq!(world.tick, 1);

        tick(&mut world, &[], &config).expect("tick");
        assert_eq!(world.tick, 2);
    }

    #[test]
    fn test_determinism() {
        let config = SimulationConfig::default();
        let mut world1 = run_world(42, &config);
        let mut world2 = run_world(42, &config);

        for _ in 0..900 {
            tick(&mut world1, &[], &config).expect("tick");
            tick(&mut world2, &[], &config).expect("tick");
            assert_eq!(world1.compute_hash(), world2.compute_hash());
        }
        assert_eq!(world1, world2);
    }

    #[test]
    fn test_first_wave_arrives() {
        let config = SimulationConfig::default();
        let mut world = run_world(3, &config);
        for _ in 0..config.balance.wave_interval_ticks {
            tick(&mut world, &[], &config).expect("tick");
        }
        assert_eq!(world.waves.number, 1);
        assert!(world.enemies_alive() >= 1);
    }

    #[test]
    fn test_invalid_event_is_dropped_and_counted() {
        let config = SimulationConfig::default();
        let mut world = run_world(1, &config);
        let event = PlayerEvent::new(0, 1, PlayerAction::ChooseUpgrade { option: 0 });

        let result = tick(&mut world, &[event], &config).expect("tick");

        assert_eq!(result.dropped.len(), 1);
        assert_eq!(result.dropped[0].reason, DropReason::NoPromptOpen);
        assert_eq!(world.events_dropped, 1);
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::EventDropped { seq: 0, .. })));
    }

    #[test]
    fn test_event_on_wrong_tick_is_defect() {
        let config = SimulationConfig::default();
        let mut world = run_world(1, &config);
        let event = PlayerEvent::new(0, 5, PlayerAction::Reroll);
        assert!(matches!(tick(&mut world, &[event], &config), Err(SimError::Invariant(_))));
    }

    #[test]
    fn test_defeat_ends_run_and_blocks_further_ticks() {
        let config = SimulationConfig::default();
        let mut world = run_world(1, &config);
        let objective = world.objectives[0].expect("objective");
        world.combatant_mut(objective).expect("present").alive = false;

        let result = tick(&mut world, &[], &config).expect("tick");
        assert_eq!(result.outcome, Some(Outcome::Defeat));
        assert!(result.events.first().is_some_and(|e| matches!(e.data, GameEventData::RunEnded { .. })));

        assert_eq!(tick(&mut world, &[], &config).err(), Some(SimError::RunEnded(1)));
    }

    #[test]
    fn test_timeout_at_max_ticks() {
        let config = SimulationConfig { max_ticks: 10, ..SimulationConfig::default() };
        let mut world = run_world(1, &config);
        for _ in 0..9 {
            assert_eq!(tick(&mut world, &[], &config).expect("tick").outcome, None);
        }
        assert_eq!(tick(&mut world, &[], &config).expect("tick").outcome, Some(Outcome::Timeout));
    }

    #[test]
    fn test_victory_beats_timeout_on_same_tick() {
        let config = SimulationConfig { max_waves: 1, max_ticks: 1, ..SimulationConfig::default() };
        let mut world = run_world(1, &config);
        world.waves.number = 1;
        world.waves.phase = WavePhase::Clearing;

        let result = tick(&mut world, &[], &config).expect("tick");
        assert_eq!(result.outcome, Some(Outcome::Victory));
        assert!(world.score() >= 200 + 100);
    }

    #[test]
    fn test_battle_outcomes() {
        let config = SimulationConfig::default();
        let mut world = WorldState::empty(1, &config, GameMode::Battle);
        let home = world.spawn_objective(Side::Home, crate::core::vec2::FixedVec2::from_ints(-20, 0), Fixed::from_int(10));
        let away = world.spawn_objective(Side::Away, crate::core::vec2::FixedVec2::from_ints(20, 0), Fixed::from_int(10));
        assert_eq!(check_outcome(&world, &config), None);

        world.combatant_mut(away).expect("present").alive = false;
        assert_eq!(check_outcome(&world, &config), Some(Outcome::Destroyed { winner: Side::Home }));

        world.combatant_mut(home).expect("present").alive = false;
        assert_eq!(check_outcome(&world, &config), Some(Outcome::MutualDestruction));
    }
}
