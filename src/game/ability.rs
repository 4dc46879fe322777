//! Castable Abilities
//!
//! Each loadout slot holds one ability with its own cooldown. Abilities are
//! cast by player events (step 1) or, for slots flagged `auto_cast`, by the
//! cooldown step (step 9) once ready.

use crate::core::fixed::{ms_to_ticks, Fixed};
use crate::core::vec2::FixedVec2;
use crate::game::action::DropReason;
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{ability_cooldown_ticks, EntityId, WorldState, Zone, ZoneKind};
use crate::game::stats::{
    ability_profile, AbilityKind, CombatantKind, Side, ABILITY_RANGE, METEOR_DELAY_TICKS,
};
use crate::game::tick::TickContext;

/// Frost nova auto-casts only at enemies this close to the objective.
const FROST_NOVA_AUTO_RANGE: Fixed = Fixed::from_int(8);

/// Repair auto-casts at or below this share of max health (percent).
const REPAIR_AUTO_THRESHOLD: i32 = 50;

/// Check whether a side can cast the ability in `slot` at `target`.
///
/// Returns the index into `world.abilities` on success.
pub fn check_cast(
    world: &WorldState,
    side: Side,
    slot: u8,
    target: FixedVec2,
) -> Result<usize, DropReason> {
    let index = world
        .abilities
        .iter()
        .position(|a| a.side == side && a.slot == slot)
        .ok_or(DropReason::UnknownSlot)?;
    let ability = &world.abilities[index];
    if !ability.is_ready() {
        return Err(DropReason::AbilityOnCooldown);
    }
    if ability.kind != AbilityKind::Repair {
        let anchor = world
            .objectives[side.index()]
            .and_then(|id| world.combatants.get(&id))
            .map(|o| o.position)
            .ok_or(DropReason::TargetOutOfRange)?;
        if !anchor.within(target, ABILITY_RANGE) {
            return Err(DropReason::TargetOutOfRange);
        }
    }
    Ok(index)
}

/// Cast a checked ability and start its cooldown.
pub fn cast(
    world: &mut WorldState,
    index: usize,
    target: FixedVec2,
    auto: bool,
    ctx: &mut TickContext<'_>,
) -> Result<(), SimError> {
    let rate = ctx.config.tick_rate;
    let ability = world
        .abilities
        .get_mut(index)
        .ok_or(SimError::Invariant("ability index out of range"))?;
    let (side, kind) = (ability.side, ability.kind);
    ability.cooldown_remaining = ability_cooldown_ticks(kind, rate);

    let profile = ability_profile(kind);
    match kind {
        AbilityKind::Meteor => {
            let id = world.alloc_id();
            world.zones.push(Zone {
                id,
                side,
                position: target,
                radius: profile.radius,
                kind: ZoneKind::Meteor { delay: METEOR_DELAY_TICKS, damage: profile.power },
                active: true,
            });
        }
        AbilityKind::FrostNova => {
            let id = world.alloc_id();
            world.zones.push(Zone {
                id,
                side,
                position: target,
                radius: profile.radius,
                kind: ZoneKind::FrostField {
                    remaining: ms_to_ticks(profile.duration_ms, rate),
                    slow_percent: profile.slow_percent,
                },
                active: true,
            });
        }
        AbilityKind::Repair => {
            let id = world.objectives[side.index()]
                .ok_or(SimError::Invariant("side has no objective"))?;
            let objective = world.combatant_mut(id)?;
            if objective.alive {
                objective.health = (objective.health + profile.power).min(objective.max_health);
            }
        }
    }

    ctx.events.push(GameEvent::player_action(
        world.tick,
        GameEventData::AbilityCast { side, kind, position: target, auto },
    ));
    Ok(())
}

/// Cooldown step (step 9): attacks count down, ready auto-cast slots fire
/// if the run is still going, then abilities count down.
///
/// Ability cooldowns tick after auto-cast so a slot cast this tick, from an
/// event in step 1 or from here, always leaves the tick at `N - 1`.
pub fn tick_cooldowns(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    for c in world.combatants.values_mut().filter(|c| c.alive) {
        if let Some(attack) = c.attack.as_mut() {
            attack.cooldown_remaining = attack.cooldown_remaining.saturating_sub(1);
        }
    }

    if world.outcome.is_none() {
        for index in 0..world.abilities.len() {
            let ability = &world.abilities[index];
            if !ability.auto_cast || !ability.is_ready() {
                continue;
            }
            if let Some(target) = auto_target(world, ability.side, ability.kind)? {
                cast(world, index, target, true, ctx)?;
            }
        }
    }

    for ability in world.abilities.iter_mut() {
        ability.cooldown_remaining = ability.cooldown_remaining.saturating_sub(1);
    }
    Ok(())
}

/// Where an auto-cast slot would fire right now, if anywhere.
fn auto_target(world: &WorldState, side: Side, kind: AbilityKind) -> Result<Option<FixedVec2>, SimError> {
    let Some(objective_id) = world.objectives[side.index()] else {
        return Ok(None);
    };
    let objective = world.combatant(objective_id)?;
    if !objective.alive {
        return Ok(None);
    }

    Ok(match kind {
        AbilityKind::Meteor => nearest_threat(world, side, objective.position, ABILITY_RANGE),
        AbilityKind::FrostNova => nearest_threat(world, side, objective.position, FROST_NOVA_AUTO_RANGE),
        AbilityKind::Repair => {
            let threshold = objective.max_health.mul_percent(REPAIR_AUTO_THRESHOLD);
            (objective.health <= threshold).then_some(objective.position)
        }
    })
}

/// Position of the opposing combatant closest to `anchor` within `radius`,
/// lowest id on ties.
fn nearest_threat(world: &WorldState, side: Side, anchor: FixedVec2, radius: Fixed) -> Option<FixedVec2> {
    let mut best: Option<(Fixed, EntityId, FixedVec2)> = None;
    for c in world.combatants.values() {
        if !c.alive || c.side == side || c.kind == CombatantKind::Objective {
            continue;
        }
        if !anchor.within(c.position, radius) {
            continue;
        }
        let d2 = anchor.distance_squared(c.position);
        if best.map_or(true, |(bd, _, _)| d2 < bd) {
            best = Some((d2, c.id, c.position));
        }
    }
    best.map(|(_, _, position)| position)
}
