//! Wave Progression and Upgrades (pipeline step 8)
//!
//! A defense run alternates between intermissions and waves:
//!
//! ```text
//! Intermission ──▶ Spawning ──▶ Clearing ──▶ Intermission ──▶ ... ──▶ Finished
//!                  (one enemy    (no enemy    (prompt open)
//!                   per spacing)  left alive)
//! ```
//!
//! Clearing a wave opens an upgrade prompt. An unanswered prompt is forfeited
//! when the next wave starts.

use crate::core::fixed::Fixed;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::action::PROMPT_OPTIONS;
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{ChoicePrompt, GameMode, SpawnSpec, WavePhase, WorldState};
use crate::game::stats::{CombatantKind, EnemyKind, Side, UpgradeKind, FORTIFY_PERCENT};
use crate::game::tick::TickContext;

/// Enemies enter this far from the center on their edge.
const SPAWN_EDGE: i32 = 38;

/// Spread of spawn points along an edge.
const SPAWN_SPREAD: i32 = 35;

/// Advance the wave state machine by one tick.
pub fn progress(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    if world.mode != GameMode::Defense || world.outcome.is_some() {
        return Ok(());
    }
    let config = ctx.config;

    match world.waves.phase {
        WavePhase::Intermission { remaining } => {
            let remaining = remaining.saturating_sub(1);
            if remaining > 0 {
                world.waves.phase = WavePhase::Intermission { remaining };
                return Ok(());
            }
            start_wave(world, ctx);
            // the first enemy enters on the wave's opening tick
            spawn_step(world, ctx)?;
        }
        WavePhase::Spawning { left, next_in } if next_in > 0 => {
            world.waves.phase = WavePhase::Spawning { left, next_in: next_in - 1 };
        }
        WavePhase::Spawning { .. } => spawn_step(world, ctx)?,
        WavePhase::Clearing => {
            if world.enemies_alive() > 0 {
                return Ok(());
            }
            let wave = world.waves.number;
            world.waves.cleared += 1;
            ctx.events.push(GameEvent::progression(world.tick, GameEventData::WaveCleared { wave }));

            if wave >= config.max_waves {
                world.waves.phase = WavePhase::Finished;
                return Ok(());
            }
            let prompt = ChoicePrompt {
                wave,
                options: draw_options(&mut world.rng),
                rerolls_left: config.rerolls_per_prompt(),
            };
            world.prompt = Some(prompt);
            ctx.events.push(GameEvent::progression(
                world.tick,
                GameEventData::PromptOpened { wave, options: prompt.options },
            ));
            world.waves.phase = WavePhase::Intermission { remaining: config.balance.wave_interval_ticks };
        }
        WavePhase::Finished => {}
    }
    Ok(())
}

fn start_wave(world: &mut WorldState, ctx: &mut TickContext<'_>) {
    if let Some(open) = world.prompt.take() {
        world.prompts_forfeited += 1;
        ctx.events.push(GameEvent::progression(
            world.tick,
            GameEventData::PromptForfeited { wave: open.wave },
        ));
    }

    world.waves.number += 1;
    let enemies = ctx.config.balance.wave_size(world.waves.number);
    world.waves.phase = WavePhase::Spawning { left: enemies, next_in: 0 };
    ctx.events.push(GameEvent::progression(
        world.tick,
        GameEventData::WaveStarted { wave: world.waves.number, enemies },
    ));
}

/// Spawn one enemy if any are left, then schedule the next.
fn spawn_step(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    let WavePhase::Spawning { left, .. } = world.waves.phase else {
        return Ok(());
    };
    if left == 0 {
        world.waves.phase = WavePhase::Clearing;
        return Ok(());
    }

    spawn_enemy(world, ctx)?;
    let left = left - 1;
    world.waves.phase = if left == 0 {
        WavePhase::Clearing
    } else {
        WavePhase::Spawning { left, next_in: ctx.config.balance.spawn_spacing_ticks - 1 }
    };
    Ok(())
}

/// Spawn one enemy of the current wave on a random edge.
///
/// Draws, in order: edge, offset along the edge, kind, and (from the elite
/// wave on) the elite roll.
pub fn spawn_enemy(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    let config = ctx.config;
    let balance = &config.balance;
    let wave = world.waves.number;

    let edge = world.rng.next_int(4);
    let offset = world
        .rng
        .next_fixed_range(Fixed::from_int(-SPAWN_SPREAD), Fixed::from_int(SPAWN_SPREAD));
    let pool = EnemyKind::pool_for_wave(wave);
    let kind = pool[world.rng.next_int(pool.len() as u32) as usize];
    let elite = wave >= balance.elite_from_wave && world.rng.next_percent(balance.elite_chance_percent);

    let edge_at = Fixed::from_int(SPAWN_EDGE);
    let position = match edge {
        0 => FixedVec2::new(offset, edge_at),
        1 => FixedVec2::new(edge_at, offset),
        2 => FixedVec2::new(offset, -edge_at),
        _ => FixedVec2::new(-edge_at, offset),
    };

    let spec = SpawnSpec {
        elite,
        health_percent: balance.wave_health_percent(wave),
        ..SpawnSpec::new(Side::Away, CombatantKind::Enemy(kind), 1, position)
    };
    let id = world.spawn_combatant(spec, config)?;
    ctx.events.push(GameEvent::spawned(world.tick, id, CombatantKind::Enemy(kind), elite));
    Ok(())
}

/// Draw the options of a prompt: the first three of a shuffled pool.
pub fn draw_options(rng: &mut DeterministicRng) -> [UpgradeKind; PROMPT_OPTIONS as usize] {
    let mut pool = UpgradeKind::ALL;
    rng.shuffle(&mut pool);
    [pool[0], pool[1], pool[2]]
}

/// Take an upgrade for the player side.
pub fn apply_upgrade(
    world: &mut WorldState,
    upgrade: UpgradeKind,
    ctx: &mut TickContext<'_>,
) -> Result<(), SimError> {
    world.upgrades.add(upgrade);
    match upgrade {
        // read at attack time
        UpgradeKind::Sharpen | UpgradeKind::Haste | UpgradeKind::Bounty => {}
        UpgradeKind::Fortify => {
            let bonus = ctx.config.base_health().mul_percent(FORTIFY_PERCENT);
            let id = world.objectives[Side::Home.index()]
                .ok_or(SimError::Invariant("side has no objective"))?;
            let objective = world.combatant_mut(id)?;
            objective.max_health += bonus;
            if objective.alive {
                objective.health += bonus;
            }
        }
        UpgradeKind::Reinforce => {
            let id = world.spawn_reinforcement(Side::Home, ctx.config)?;
            let kind = world.combatant(id)?.kind;
            ctx.events.push(GameEvent::spawned(world.tick, id, kind, false));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::SimulationConfig;
    use crate::game::state::WaveState;

    fn defense_world(config: &SimulationConfig) -> WorldState {
        WorldState::new_run(7, config).expect("valid config")
    }

    fn advance(world: &mut WorldState, config: &SimulationConfig, ticks: u32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            world.tick += 1;
            let mut ctx = TickContext::new(config);
            progress(world, &mut ctx).expect("progress");
            events.extend(ctx.events);
        }
        events
    }

    #[test]
    fn test_first_wave_starts_after_interval() {
        let config = SimulationConfig::default();
        let mut world = defense_world(&config);

        advance(&mut world, &config, config.balance.wave_interval_ticks - 1);
        assert_eq!(world.waves.number, 0);
        assert_eq!(world.enemies_alive(), 0);

        let events = advance(&mut world, &config, 1);
        assert_eq!(world.waves.number, 1);
        assert_eq!(world.enemies_alive(), 1);
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::WaveStarted { wave: 1, enemies: 5 })));
    }

    #[test]
    fn test_enemies_spawn_at_spacing() {
        let config = SimulationConfig::default();
        let mut world = defense_world(&config);
        advance(&mut world, &config, config.balance.wave_interval_ticks);

        let spacing = config.balance.spawn_spacing_ticks;
        advance(&mut world, &config, spacing - 1);
        assert_eq!(world.enemies_alive(), 1);
        advance(&mut world, &config, 1);
        assert_eq!(world.enemies_alive(), 2);

        advance(&mut world, &config, spacing * 3);
        assert_eq!(world.enemies_alive(), 5);
        assert_eq!(world.waves.phase, WavePhase::Clearing);
    }

    #[test]
    fn test_clear_opens_prompt_and_next_wave_forfeits_it() {
        let config = SimulationConfig::default();
        let mut world = defense_world(&config);
        world.waves = WaveState { number: 1, phase: WavePhase::Clearing, cleared: 0 };

        let events = advance(&mut world, &config, 1);
        assert_eq!(world.waves.cleared, 1);
        let prompt = world.prompt.expect("prompt open");
        assert_eq!(prompt.rerolls_left, config.rerolls_per_prompt());
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::PromptOpened { wave: 1, .. })));

        let events = advance(&mut world, &config, config.balance.wave_interval_ticks);
        assert!(world.prompt.is_none());
        assert_eq!(world.prompts_forfeited, 1);
        assert_eq!(world.waves.number, 2);
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::PromptForfeited { wave: 1 })));
    }

    #[test]
    fn test_last_wave_finishes() {
        let config = SimulationConfig { max_waves: 1, ..SimulationConfig::default() };
        let mut world = defense_world(&config);
        world.waves = WaveState { number: 1, phase: WavePhase::Clearing, cleared: 0 };

        advance(&mut world, &config, 1);
        assert_eq!(world.waves.phase, WavePhase::Finished);
        assert!(world.prompt.is_none());
    }

    #[test]
    fn test_draw_options_are_distinct() {
        let mut rng = DeterministicRng::from_run_seed(3);
        for _ in 0..50 {
            let [a, b, c] = draw_options(&mut rng);
            assert!(a != b && b != c && a != c);
        }
    }

    #[test]
    fn test_fortify_and_reinforce() {
        let config = SimulationConfig::default();
        let mut world = defense_world(&config);
        let units_before = world.alive_count(Side::Home);
        let mut ctx = TickContext::new(&config);

        apply_upgrade(&mut world, UpgradeKind::Fortify, &mut ctx).expect("fortify");
        let objective = world.objective(Side::Home).expect("objective");
        assert_eq!(objective.max_health, Fixed::from_int(1100));
        assert_eq!(objective.health, Fixed::from_int(1100));

        apply_upgrade(&mut world, UpgradeKind::Reinforce, &mut ctx).expect("reinforce");
        assert_eq!(world.alive_count(Side::Home), units_before + 1);
        assert_eq!(world.upgrades.total(), 2);
    }
}
