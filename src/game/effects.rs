//! Auras, Modifiers, Statuses and Zones (pipeline step 6)
//!
//! Runs after every hit of the tick has been queued and before any of them is
//! applied. Order inside the step:
//!
//! 1. Recompute aura bonuses from the current positions.
//! 2. Scale queued direct and splash hits: aura, combo, weakness, mark.
//! 3. Apply on-hit statuses.
//! 4. Pulse burns and tick status durations down.
//! 5. Resolve ability zones (meteor impacts, frost fields).
//!
//! Hits queued by 4 and 5 are not scaled.

use crate::core::fixed::ms_to_ticks;
use crate::game::damage::{Hit, HitKind};
use crate::game::error::SimError;
use crate::game::state::{Burn, Combo, EntityId, Slow, WorldState, ZoneKind};
use crate::game::stats::{
    DamageType, StatusKind, BURN_DAMAGE, BURN_DURATION_MS, BURN_PERIOD_TICKS, COMBO_MAX_STACKS,
    COMBO_PERCENT_PER_STACK, COMBO_WINDOW_MS, MARK_DURATION_MS, MARK_PERCENT, SLOW_DURATION_MS,
    SLOW_PERCENT, WEAKNESS_PERCENT,
};
use crate::game::tick::TickContext;

/// Run the whole step.
pub fn apply_effects(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    recompute_auras(world);
    scale_hits(world, ctx)?;
    apply_statuses(world, ctx)?;
    tick_statuses(world, ctx);
    resolve_zones(world, ctx);
    Ok(())
}

/// Every living combatant receives the summed bonus of the allied auras
/// covering it. Emitters do not buff themselves.
fn recompute_auras(world: &mut WorldState) {
    let emitters: Vec<_> = world
        .combatants
        .values()
        .filter(|c| c.alive)
        .filter_map(|c| c.aura.map(|a| (c.id, c.side, c.position, a)))
        .collect();

    for c in world.combatants.values_mut() {
        c.aura_bonus = 0;
        if !c.alive {
            continue;
        }
        for &(id, side, position, aura) in &emitters {
            if id != c.id && side == c.side && position.within(c.position, aura.radius) {
                c.aura_bonus = c.aura_bonus.saturating_add(aura.bonus_percent);
            }
        }
    }
}

/// Advance the attacker's combo on `target` and return the stack count for this hit.
fn advance_combo(combo: Option<Combo>, target: EntityId, tick: u32, window: u32) -> Combo {
    match combo {
        Some(c) if c.target == target && tick.saturating_sub(c.last_hit_tick) <= window => Combo {
            target,
            stacks: (c.stacks + 1).min(COMBO_MAX_STACKS),
            last_hit_tick: tick,
        },
        _ => Combo { target, stacks: 0, last_hit_tick: tick },
    }
}

fn scale_hits(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    let tick = world.tick;
    let window = ms_to_ticks(COMBO_WINDOW_MS, ctx.config.tick_rate);

    for hit in ctx.hits.iter_mut() {
        if !matches!(hit.kind, HitKind::Direct | HitKind::Splash) {
            continue;
        }

        // the shooter of a projectile may already be gone
        if let Some(source) = hit.source.and_then(|id| world.combatants.get_mut(&id)) {
            hit.amount = hit.amount.mul_percent(100i32.saturating_add(source.aura_bonus));
            if hit.kind == HitKind::Direct {
                let combo = advance_combo(source.combo, hit.target, tick, window);
                source.combo = Some(combo);
                let bonus = COMBO_PERCENT_PER_STACK * combo.stacks as i32;
                hit.amount = hit.amount.mul_percent(100 + bonus);
            }
        }

        let target = world.combatant(hit.target)?;
        if target.weakness == Some(hit.damage_type) {
            hit.amount = hit.amount.mul_percent(WEAKNESS_PERCENT);
        }
        if target.statuses.mark.is_some() {
            hit.amount = hit.amount.mul_percent(100 + MARK_PERCENT);
        }
    }
    Ok(())
}

fn apply_statuses(world: &mut WorldState, ctx: &TickContext<'_>) -> Result<(), SimError> {
    let rate = ctx.config.tick_rate;
    for hit in &ctx.hits {
        let Some(status) = hit.on_hit else { continue };
        let target = world.combatant_mut(hit.target)?;
        if !target.alive {
            continue;
        }
        let statuses = &mut target.statuses;
        match status {
            StatusKind::Burn => {
                // refresh keeps the pulse phase
                let elapsed = statuses.burn.map_or(0, |b| b.elapsed);
                statuses.burn = Some(Burn { remaining: ms_to_ticks(BURN_DURATION_MS, rate), elapsed });
            }
            StatusKind::Slow => {
                let percent = statuses.slow.map_or(SLOW_PERCENT, |s| s.percent.max(SLOW_PERCENT));
                statuses.slow = Some(Slow { remaining: ms_to_ticks(SLOW_DURATION_MS, rate), percent });
            }
            StatusKind::Mark => {
                statuses.mark = Some(ms_to_ticks(MARK_DURATION_MS, rate));
            }
        }
    }
    Ok(())
}

fn tick_statuses(world: &mut WorldState, ctx: &mut TickContext<'_>) {
    for c in world.combatants.values_mut().filter(|c| c.alive) {
        let statuses = &mut c.statuses;

        if let Some(mut burn) = statuses.burn {
            burn.elapsed += 1;
            if burn.elapsed % BURN_PERIOD_TICKS == 0 {
                ctx.hits.push(Hit::new(
                    None,
                    c.side.opponent(),
                    c.id,
                    BURN_DAMAGE,
                    DamageType::Fire,
                    HitKind::Burn,
                ));
            }
            burn.remaining -= 1;
            statuses.burn = (burn.remaining > 0).then_some(burn);
        }

        if let Some(mut slow) = statuses.slow {
            slow.remaining -= 1;
            statuses.slow = (slow.remaining > 0).then_some(slow);
        }

        if let Some(mark) = statuses.mark {
            statuses.mark = (mark > 1).then(|| mark - 1);
        }
    }
}

fn resolve_zones(world: &mut WorldState, ctx: &mut TickContext<'_>) {
    let WorldState { zones, combatants, .. } = world;

    for zone in zones.iter_mut().filter(|z| z.active) {
        let (side, center, radius) = (zone.side, zone.position, zone.radius);
        let victims = combatants
            .values_mut()
            .filter(move |c| c.alive && c.side != side)
            .filter(move |c| center.within(c.position, radius + c.body_radius));

        match &mut zone.kind {
            ZoneKind::Meteor { delay, damage } => {
                *delay = delay.saturating_sub(1);
                if *delay > 0 {
                    continue;
                }
                for c in victims {
                    ctx.hits.push(Hit::new(None, side, c.id, *damage, DamageType::Fire, HitKind::Zone));
                }
                zone.active = false;
            }
            ZoneKind::FrostField { remaining, slow_percent } => {
                for c in victims {
                    let current = c.statuses.slow;
                    c.statuses.slow = Some(Slow {
                        remaining: current.map_or(1, |s| s.remaining.max(1)),
                        percent: current.map_or(*slow_percent, |s| s.percent.max(*slow_percent)),
                    });
                }
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    zone.active = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::Fixed;
    use crate::core::vec2::FixedVec2;
    use crate::game::config::SimulationConfig;
    use crate::game::state::{GameMode, SpawnSpec, Zone};
    use crate::game::stats::{CombatantKind, DefenseKind, EnemyKind, Side, UnitKind};

    struct Field {
        config: SimulationConfig,
        world: WorldState,
    }

    impl Field {
        fn new() -> Self {
            let config = SimulationConfig::default();
            let world = WorldState::empty(1, &config, GameMode::Defense);
            Self { config, world }
        }

        fn spawn(&mut self, side: Side, kind: CombatantKind, x: i32) -> EntityId {
            self.world
                .spawn_combatant(SpawnSpec::new(side, kind, 1, FixedVec2::from_ints(x, 0)), &self.config)
                .expect("spawn")
        }
    }

    fn direct(source: EntityId, target: EntityId, amount: i32, damage_type: DamageType) -> Hit {
        Hit::new(Some(source), Side::Home, target, Fixed::from_int(amount), damage_type, HitKind::Direct)
    }

    #[test]
    fn test_aura_and_weakness_scale_hits() {
        let mut field = Field::new();
        let knight = field.spawn(Side::Home, CombatantKind::Unit(UnitKind::Knight), 0);
        field.spawn(Side::Home, CombatantKind::Defense(DefenseKind::Beacon), 2);
        let runner = field.spawn(Side::Away, CombatantKind::Enemy(EnemyKind::Runner), 1);

        let config = field.config.clone();
        let mut ctx = TickContext::new(&config);
        ctx.hits.push(direct(knight, runner, 100, DamageType::Physical));
        apply_effects(&mut field.world, &mut ctx).expect("effects");

        // beacon +15%, then physical weakness x1.5
        assert_eq!(field.world.combatant(knight).expect("present").aura_bonus, 15);
        assert_eq!(ctx.hits[0].amount, Fixed::from_int(100).mul_percent(115).mul_percent(150));
    }

    #[test]
    fn test_combo_stacks_on_same_target() {
        let mut field = Field::new();
        let knight = field.spawn(Side::Home, CombatantKind::Unit(UnitKind::Knight), 0);
        let brute = field.spawn(Side::Away, CombatantKind::Enemy(EnemyKind::Brute), 1);
        let config = field.config.clone();

        let mut amounts = Vec::new();
        for _ in 0..3 {
            field.world.tick += 30;
            let mut ctx = TickContext::new(&config);
            ctx.hits.push(direct(knight, brute, 100, DamageType::Physical));
            apply_effects(&mut field.world, &mut ctx).expect("effects");
            amounts.push(ctx.hits[0].amount);
        }
        assert_eq!(amounts, vec![Fixed::from_int(100), Fixed::from_int(105), Fixed::from_int(110)]);

        // a gap longer than the window resets the chain
        field.world.tick += 200;
        let mut ctx = TickContext::new(&config);
        ctx.hits.push(direct(knight, brute, 100, DamageType::Physical));
        apply_effects(&mut field.world, &mut ctx).expect("effects");
        assert_eq!(ctx.hits[0].amount, Fixed::from_int(100));
    }

    #[test]
    fn test_burn_pulses_every_period() {
        let mut field = Field::new();
        let brazier = field.spawn(Side::Home, CombatantKind::Defense(DefenseKind::Brazier), 0);
        let brute = field.spawn(Side::Away, CombatantKind::Enemy(EnemyKind::Brute), 1);
        let config = field.config.clone();

        let mut ctx = TickContext::new(&config);
        ctx.hits.push(Hit { on_hit: Some(StatusKind::Burn), ..direct(brazier, brute, 1, DamageType::Fire) });
        apply_effects(&mut field.world, &mut ctx).expect("effects");
        assert!(field.world.combatant(brute).expect("present").statuses.has(StatusKind::Burn));

        let mut pulses = 0;
        for _ in 0..120 {
            let mut ctx = TickContext::new(&config);
            apply_effects(&mut field.world, &mut ctx).expect("effects");
            pulses += ctx.hits.iter().filter(|h| h.kind == HitKind::Burn).count();
        }
        // 90 ticks of burn, one pulse every 10
        assert_eq!(pulses, 9);
        assert!(!field.world.combatant(brute).expect("present").statuses.has(StatusKind::Burn));
    }

    #[test]
    fn test_meteor_lands_after_delay() {
        let mut field = Field::new();
        let grunt = field.spawn(Side::Away, CombatantKind::Enemy(EnemyKind::Grunt), 10);
        let id = field.world.alloc_id();
        field.world.zones.push(Zone {
            id,
            side: Side::Home,
            position: FixedVec2::from_ints(10, 1),
            radius: Fixed::from_int(3),
            kind: ZoneKind::Meteor { delay: 3, damage: Fixed::from_int(60) },
            active: true,
        });
        let config = field.config.clone();

        let mut zone_hits = Vec::new();
        for _ in 0..3 {
            let mut ctx = TickContext::new(&config);
            apply_effects(&mut field.world, &mut ctx).expect("effects");
            zone_hits.push(ctx.hits.iter().filter(|h| h.kind == HitKind::Zone).count());
        }
        assert_eq!(zone_hits, vec![0, 0, 1]);
        assert!(!field.world.zones[0].active);
        assert_eq!(field.world.combatant(grunt).expect("present").health, Fixed::from_int(40));
    }

    #[test]
    fn test_frost_field_slows_opponents_only() {
        let mut field = Field::new();
        let grunt = field.spawn(Side::Away, CombatantKind::Enemy(EnemyKind::Grunt), 0);
        let knight = field.spawn(Side::Home, CombatantKind::Unit(UnitKind::Knight), 1);
        let id = field.world.alloc_id();
        field.world.zones.push(Zone {
            id,
            side: Side::Home,
            position: FixedVec2::ZERO,
            radius: Fixed::from_int(4),
            kind: ZoneKind::FrostField { remaining: 2, slow_percent: 50 },
            active: true,
        });
        let config = field.config.clone();
        let mut ctx = TickContext::new(&config);
        apply_effects(&mut field.world, &mut ctx).expect("effects");

        assert_eq!(field.world.combatant(grunt).expect("present").statuses.slow.map(|s| s.percent), Some(50));
        assert!(field.world.combatant(knight).expect("present").statuses.slow.is_none());
    }
}
