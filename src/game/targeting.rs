//! Target Acquisition (pipeline step 2)
//!
//! Every attacker re-picks its target every tick from the living opposing
//! combatants: nearest by squared distance, ties to the lowest id. Nothing is
//! cached between ticks.

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::error::SimError;
use crate::game::state::{Combatant, EntityId, GameMode, WorldState};
use crate::game::stats::{CombatantKind, Side};

/// How far from its guard point a defending unit will chase.
pub const UNIT_LEASH: Fixed = Fixed::from_int(12);

/// Is `target` within `range` of `from`, measured to the target's body edge?
#[inline]
pub fn in_range(from: FixedVec2, range: Fixed, target: &Combatant) -> bool {
    from.within(target.position, range + target.body_radius)
}

#[derive(Clone, Copy)]
struct Candidate {
    id: EntityId,
    side: Side,
    position: FixedVec2,
}

/// Where a combatant is allowed to look for targets.
enum Search {
    /// Anything within attack range of the current position.
    Range(Fixed),
    /// Anything within a radius of the guard point.
    Leash(FixedVec2),
    /// Anything.
    Anywhere,
}

fn search_area(mode: GameMode, c: &Combatant) -> Option<Search> {
    let attack = c.attack.as_ref()?;
    Some(match (c.kind, mode) {
        (CombatantKind::Defense(_), _) => Search::Range(attack.range),
        (CombatantKind::Unit(_), GameMode::Defense) => Search::Leash(c.anchor),
        (CombatantKind::Unit(_), GameMode::Battle) => Search::Anywhere,
        (CombatantKind::Enemy(_), _) => Search::Anywhere,
        (CombatantKind::Objective, _) => return None,
    })
}

/// Nearest candidate on the other side, lowest id on ties.
fn nearest(
    candidates: &[Candidate],
    side: Side,
    origin: FixedVec2,
    accept: impl Fn(&Candidate) -> bool,
) -> Option<EntityId> {
    let mut best: Option<(Fixed, EntityId)> = None;
    // candidates are in id order, so strict `<` keeps the lowest id on ties
    for cand in candidates.iter().filter(|c| c.side != side) {
        if !accept(cand) {
            continue;
        }
        let d2 = origin.distance_squared(cand.position);
        if best.map_or(true, |(bd, _)| d2 < bd) {
            best = Some((d2, cand.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Assign targets for every living attacker.
pub fn acquire_targets(world: &mut WorldState) -> Result<(), SimError> {
    let candidates: Vec<Candidate> = world
        .combatants
        .values()
        .filter(|c| c.is_targetable())
        .map(|c| Candidate { id: c.id, side: c.side, position: c.position })
        .collect();

    let mode = world.mode;
    let mut assignments: Vec<(EntityId, Option<EntityId>)> = Vec::new();
    for c in world.combatants.values().filter(|c| c.alive) {
        let Some(area) = search_area(mode, c) else {
            continue;
        };
        let chosen = match area {
            Search::Range(range) => {
                let bodies = &world.combatants;
                nearest(&candidates, c.side, c.position, |cand| {
                    bodies.get(&cand.id).is_some_and(|t| in_range(c.position, range, t))
                })
            }
            Search::Leash(anchor) => nearest(&candidates, c.side, c.position, |cand| {
                anchor.within(cand.position, UNIT_LEASH)
            }),
            Search::Anywhere => nearest(&candidates, c.side, c.position, |_| true),
        };
        assignments.push((c.id, chosen));
    }

    for (id, target) in assignments {
        world.combatant_mut(id)?.target = target;
    }
    Ok(())
}
