//! Batched Damage and Death (pipeline step 7)
//!
//! Every hit of the tick is queued in the [`TickContext`] by steps 4 to 6 and
//! applied here in queue order. Deaths are decided only after the whole queue
//! is applied: a combatant killed this tick still landed all of its own hits
//! this tick, and overkill hits still count as damage dealt.

use std::collections::BTreeMap;

use crate::core::fixed::Fixed;
use crate::game::error::SimError;
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::state::{EntityId, GameMode, WorldState};
use crate::game::stats::{CombatantKind, DamageType, Side, StatusKind, UpgradeKind, BOUNTY_PERCENT};
use crate::game::tick::TickContext;

/// Where a queued hit came from. Determines which modifiers apply in step 6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitKind {
    /// Primary target of an attack or projectile.
    Direct,
    /// Secondary target inside a splash radius.
    Splash,
    /// Burn pulse.
    Burn,
    /// Ability zone impact.
    Zone,
}

/// One queued instance of damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    /// Attacker, if the hit came from a combatant
    pub source: Option<EntityId>,
    /// Side credited with the damage
    pub side: Side,
    /// Victim
    pub target: EntityId,
    /// Amount (modifiers applied in step 6)
    pub amount: Fixed,
    /// Element
    pub damage_type: DamageType,
    /// Origin
    pub kind: HitKind,
    /// Status the hit applies
    pub on_hit: Option<StatusKind>,
}

impl Hit {
    /// A hit with no status.
    pub fn new(
        source: Option<EntityId>,
        side: Side,
        target: EntityId,
        amount: Fixed,
        damage_type: DamageType,
        kind: HitKind,
    ) -> Self {
        Self { source, side, target, amount, damage_type, kind, on_hit: None }
    }
}

/// Apply the tick's damage queue, then settle deaths.
pub fn resolve_damage(world: &mut WorldState, ctx: &mut TickContext<'_>) -> Result<(), SimError> {
    // victim -> source of the blow that first took it to zero this tick
    let mut lethal: BTreeMap<EntityId, Option<EntityId>> = BTreeMap::new();
    let mut objective_hit = [false; 2];

    for hit in ctx.hits.drain(..) {
        if !hit.amount.is_positive() {
            continue;
        }
        let target = world.combatant_mut(hit.target)?;
        let before = target.health;
        target.health -= hit.amount;
        if target.kind == CombatantKind::Objective {
            objective_hit[target.side.index()] = true;
        }
        if target.alive && before.is_positive() && !target.health.is_positive() {
            lethal.entry(hit.target).or_insert(hit.source);
        }
        let stats = &mut world.stats[hit.side.index()];
        stats.damage_raw = stats.damage_raw.saturating_add(hit.amount.raw() as i64);
    }

    for side in [Side::Home, Side::Away] {
        if objective_hit[side.index()] {
            let health = world.objective(side)?.health;
            ctx.events.push(GameEvent::new(
                world.tick,
                EventPriority::Other,
                GameEventData::ObjectiveHit { side, health },
            ));
        }
    }

    let bounty_percent = 100 + BOUNTY_PERCENT * world.upgrades.count(UpgradeKind::Bounty);
    for (id, killer) in lethal {
        let victim = world.combatant_mut(id)?;
        victim.alive = false;
        let (side, kind, elite, bounty) = (victim.side, victim.kind, victim.elite, victim.bounty);

        if kind != CombatantKind::Objective {
            let credited = &mut world.stats[side.opponent().index()];
            credited.kills = credited.kills.saturating_add(1);
            if elite {
                credited.elite_kills = credited.elite_kills.saturating_add(1);
            }
            if world.mode == GameMode::Defense && matches!(kind, CombatantKind::Enemy(_)) {
                let earned = bounty.saturating_mul(bounty_percent) / 100;
                credited.resources = credited.resources.saturating_add(earned);
            }
            let own = &mut world.stats[side.index()];
            own.losses = own.losses.saturating_add(1);
        }

        ctx.events.push(GameEvent::died(world.tick, id, kind, killer));
    }
    Ok(())
}
