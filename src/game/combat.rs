//! Attacks and Projectiles (pipeline steps 4 and 5)
//!
//! Attacks never touch health directly. An attack either queues a hit for
//! step 7 (melee and other instant attacks) or puts a homing projectile in
//! flight, which queues its hit on impact in a later tick.

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::damage::{Hit, HitKind};
use crate::game::error::SimError;
use crate::game::state::{AttackState, EntityId, GameMode, Projectile, WorldState};
use crate::game::stats::{
    DamageType, Side, StatusKind, UpgradeKind, CRIT_PERCENT, HASTE_MAX_STACKS, HASTE_PERCENT,
    SHARPEN_PERCENT, SPLASH_PERCENT,
};
use crate::game::targeting::in_range;
use crate::game::tick::TickContext;

/// Upgrades and balance knobs only ever buff the defending player.
fn player_buffed(world: &WorldState, side: Side) -> bool {
    world.mode == GameMode::Defense && side == Side::Home
}

/// Attack cooldown after haste stacks, at least one tick.
pub fn effective_cooldown(world: &WorldState, side: Side, cooldown_ticks: u32) -> u32 {
    if !player_buffed(world, side) {
        return cooldown_ticks.max(1);
    }
    let stacks = world.upgrades.count(UpgradeKind::Haste).min(HASTE_MAX_STACKS);
    let percent = 100 - HASTE_PERCENT * stacks;
    (cooldown_ticks.saturating_mul(percent) / 100).max(1)
}

/// Outgoing damage after the balance knob and sharpen stacks.
pub fn outgoing_damage(world: &WorldState, side: Side, base: Fixed, ctx: &TickContext<'_>) -> Fixed {
    if !player_buffed(world, side) {
        return base;
    }
    let sharpen = SHARPEN_PERCENT.saturating_mul(world.upgrades.count(UpgradeKind::Sharpen) as i32);
    base.mul_percent(ctx.config.balance.base_damage_percent)
        .mul_percent(100i32.saturating_add(sharpen))
}

/// One resolved strike, before it becomes a hit or a projectile.
struct Strike {
    source: EntityId,
    side: Side,
    target: EntityId,
    origin: FixedVec2,
    damage: Fixed,
    attack: AttackState,
    crit: bool,
}

/// Every ready attacker with a target in range strikes once (step 4).
pub fn resolve_attacks(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    let attackers: Vec<EntityId> = world
        .combatants
        .values()
        .filter(|c| c.alive && c.target.is_some())
        .filter(|c| c.attack.is_some_and(|a| a.cooldown_remaining == 0))
        .map(|c| c.id)
        .collect();

    for id in attackers {
        let (side, origin, target_id, attack) = {
            let c = world.combatant(id)?;
            let Some(attack) = c.attack else { continue };
            let Some(target_id) = c.target else { continue };
            (c.side, c.position, target_id, attack)
        };
        let target = world.combatant(target_id)?;
        if !target.alive || !in_range(origin, attack.range, target) {
            continue;
        }

        let mut damage = outgoing_damage(world, side, attack.damage, ctx);
        // the roll only happens for attacks that can crit
        let crit = attack.crit_percent > 0 && world.rng.next_percent(attack.crit_percent);
        if crit {
            damage = damage.mul_percent(CRIT_PERCENT);
        }

        if attack.projectile_step.is_positive() {
            launch(world, Strike { source: id, side, target: target_id, origin, damage, attack, crit });
        } else {
            let center = world.combatant(target_id)?.position;
            queue_impact(
                world,
                ctx,
                Impact {
                    source: id,
                    side,
                    target: target_id,
                    center,
                    damage,
                    damage_type: attack.damage_type,
                    splash_radius: attack.splash_radius,
                    on_hit: attack.on_hit,
                },
            );
        }

        let cooldown = effective_cooldown(world, side, attack.cooldown_ticks);
        if let Some(a) = world.combatant_mut(id)?.attack.as_mut() {
            a.cooldown_remaining = cooldown;
        }
    }
    Ok(())
}

fn launch(world: &mut WorldState, strike: Strike) {
    let id = world.alloc_id();
    world.projectiles.insert(
        id,
        Projectile {
            id,
            side: strike.side,
            source: strike.source,
            target: strike.target,
            position: strike.origin,
            step: strike.attack.projectile_step,
            damage: strike.damage,
            damage_type: strike.attack.damage_type,
            splash_radius: strike.attack.splash_radius,
            on_hit: strike.attack.on_hit,
            crit: strike.crit,
            alive: true,
        },
    );
}

/// Where and how hard a strike lands; splash is measured from `center`.
struct Impact {
    source: EntityId,
    side: Side,
    target: EntityId,
    center: FixedVec2,
    damage: Fixed,
    damage_type: DamageType,
    splash_radius: Fixed,
    on_hit: Option<StatusKind>,
}

fn queue_impact(world: &WorldState, ctx: &mut TickContext<'_>, impact: Impact) {
    ctx.hits.push(Hit {
        on_hit: impact.on_hit,
        ..Hit::new(
            Some(impact.source),
            impact.side,
            impact.target,
            impact.damage,
            impact.damage_type,
            HitKind::Direct,
        )
    });

    if !impact.splash_radius.is_positive() {
        return;
    }
    let splash = impact.damage.mul_percent(SPLASH_PERCENT);
    for c in world.combatants.values() {
        if c.id == impact.target || c.side == impact.side || !c.is_targetable() {
            continue;
        }
        if impact.center.within(c.position, impact.splash_radius + c.body_radius) {
            ctx.hits.push(Hit::new(
                Some(impact.source),
                impact.side,
                c.id,
                splash,
                impact.damage_type,
                HitKind::Splash,
            ));
        }
    }
}

/// Move every projectile toward its target; impacts queue hits (step 5).
///
/// A projectile whose target died earlier this tick fizzles. A projectile
/// whose target is gone from the world is a defect: sweep removes both
/// together.
pub fn advance_projectiles(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    let ids: Vec<EntityId> = world.projectiles.keys().copied().collect();

    for id in ids {
        let Some(p) = world.projectiles.get(&id).cloned() else { continue };
        if !p.alive {
            continue;
        }
        let target = world.combatant(p.target)?;
        if !target.alive {
            if let Some(p) = world.projectiles.get_mut(&id) {
                p.alive = false;
            }
            continue;
        }
        let aim = target.position;
        let reach = target.body_radius;

        let position = p.position.step_toward(aim, p.step);
        let arrived = position.within(aim, reach);
        if arrived {
            queue_impact(
                world,
                ctx,
                Impact {
                    source: p.source,
                    side: p.side,
                    target: p.target,
                    center: aim,
                    damage: p.damage,
                    damage_type: p.damage_type,
                    splash_radius: p.splash_radius,
                    on_hit: p.on_hit,
                },
            );
        }
        if let Some(p) = world.projectiles.get_mut(&id) {
            p.position = position;
            p.alive = !arrived;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::SimulationConfig;
    use crate::game::state::SpawnSpec;
    use crate::game::stats::{CombatantKind, DefenseKind, EnemyKind, UnitKind};

    fn spawn(world: &mut WorldState, config: &SimulationConfig, side: Side, kind: CombatantKind, x: i32) -> EntityId {
        world
            .spawn_combatant(SpawnSpec::new(side, kind, 1, FixedVec2::from_ints(x, 0)), config)
            .expect("spawn")
    }

    #[test]
    fn test_melee_queues_direct_hit_and_sets_cooldown() {
        let config = SimulationConfig::default();
        let mut world = WorldState::empty(1, &config, GameMode::Defense);
        let knight = spawn(&mut world, &config, Side::Home, CombatantKind::Unit(UnitKind::Knight), 0);
        let grunt = spawn(&mut world, &config, Side::Away, CombatantKind::Enemy(EnemyKind::Grunt), 1);
        world.combatant_mut(knight).expect("present").target = Some(grunt);

        let mut ctx = TickContext::new(&config);
        resolve_attacks(&mut world, &mut ctx).expect("attacks");

        assert_eq!(ctx.hits.len(), 1);
        assert_eq!(ctx.hits[0].amount, Fixed::from_int(12));
        assert_eq!(ctx.hits[0].kind, HitKind::Direct);
        let attack = world.combatant(knight).expect("present").attack.expect("attack");
        assert_eq!(attack.cooldown_remaining, attack.cooldown_ticks);
    }

    #[test]
    fn test_ranged_attack_launches_projectile_that_lands() {
        let config = SimulationConfig::default();
        let mut world = WorldState::empty(1, &config, GameMode::Defense);
        let cannon = spawn(&mut world, &config, Side::Home, CombatantKind::Defense(DefenseKind::CannonTower), 0);
        let grunt = spawn(&mut world, &config, Side::Away, CombatantKind::Enemy(EnemyKind::Grunt), 3);
        let neighbour = spawn(&mut world, &config, Side::Away, CombatantKind::Enemy(EnemyKind::Grunt), 4);
        world.combatant_mut(cannon).expect("present").target = Some(grunt);

        let mut ctx = TickContext::new(&config);
        resolve_attacks(&mut world, &mut ctx).expect("attacks");
        assert!(ctx.hits.is_empty());
        assert_eq!(world.projectiles.len(), 1);

        // 9 units/s at 30 ticks/s covers 3 units in 10 ticks
        let mut landed = Vec::new();
        for _ in 0..12 {
            let mut ctx = TickContext::new(&config);
            advance_projectiles(&mut world, &mut ctx).expect("projectiles");
            landed.extend(ctx.hits);
        }
        assert_eq!(landed.len(), 2);
        assert_eq!(landed[0].target, grunt);
        assert_eq!(landed[1].target, neighbour);
        assert_eq!(landed[1].kind, HitKind::Splash);
        assert!(world.projectiles.values().all(|p| !p.alive));
    }

    #[test]
    fn test_haste_shortens_cooldown() {
        let config = SimulationConfig::default();
        let mut world = WorldState::empty(1, &config, GameMode::Defense);
        assert_eq!(effective_cooldown(&world, Side::Home, 30), 30);
        for _ in 0..7 {
            world.upgrades.add(UpgradeKind::Haste);
        }
        // capped at five stacks
        assert_eq!(effective_cooldown(&world, Side::Home, 30), 15);
        assert_eq!(effective_cooldown(&world, Side::Away, 30), 30);
        assert_eq!(effective_cooldown(&world, Side::Home, 1), 1);
    }
}
