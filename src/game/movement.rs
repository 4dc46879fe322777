//! Movement (pipeline step 3)
//!
//! Mobile combatants close on their target until it is in attack range.
//! Idle units walk back to their guard point; idle enemies march on the
//! opposing objective. Positions update in id order, so a mover sees the
//! already-updated position of any lower-id target.

use crate::core::vec2::FixedVec2;
use crate::game::error::SimError;
use crate::game::state::{EntityId, WorldState};
use crate::game::stats::CombatantKind;
use crate::game::targeting::in_range;

fn destination(world: &WorldState, id: EntityId) -> Result<Option<FixedVec2>, SimError> {
    let mover = world.combatant(id)?;
    if let Some(target_id) = mover.target {
        let target = world.combatant(target_id)?;
        let range = mover.attack.map(|a| a.range).unwrap_or_default();
        if in_range(mover.position, range, target) {
            return Ok(None);
        }
        return Ok(Some(target.position));
    }

    match mover.kind {
        CombatantKind::Unit(_) if mover.position != mover.anchor => Ok(Some(mover.anchor)),
        CombatantKind::Enemy(_) => Ok(world
            .objectives[mover.side.opponent().index()]
            .and_then(|oid| world.combatants.get(&oid))
            .filter(|o| o.alive)
            .map(|o| o.position)),
        _ => Ok(None),
    }
}

/// Move every living mobile combatant one step.
pub fn move_combatants(world: &mut WorldState) -> Result<(), SimError> {
    let movers: Vec<EntityId> = world
        .combatants
        .values()
        .filter(|c| c.alive && c.kind.is_mobile())
        .map(|c| c.id)
        .collect();

    for id in movers {
        let Some(dest) = destination(world, id)? else {
            continue;
        };
        let mover = world.combatant_mut(id)?;
        let step = mover.effective_step();
        mover.position = mover.position.step_toward(dest, step).clamp_to_arena();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::Fixed;
    use crate::game::config::SimulationConfig;
    use crate::game::state::{GameMode, Slow, SpawnSpec};
    use crate::game::stats::{EnemyKind, Side};

    fn setup() -> (WorldState, EntityId) {
        let config = SimulationConfig::default();
        let mut world = WorldState::empty(1, &config, GameMode::Defense);
        world.spawn_objective(Side::Home, FixedVec2::ZERO, Fixed::from_int(100));
        let runner = world
            .spawn_combatant(
                SpawnSpec::new(Side::Away, CombatantKind::Enemy(EnemyKind::Runner), 1, FixedVec2::from_ints(30, 0)),
                &config,
            )
            .expect("spawn");
        (world, runner)
    }

    #[test]
    fn test_idle_enemy_marches_on_objective() {
        let (mut world, runner) = setup();
        let before = world.combatant(runner).expect("present").position;

        move_combatants(&mut world).expect("movement");

        let after = world.combatant(runner).expect("present").position;
        assert!(after.x < before.x);
        assert_eq!(after.y, Fixed::ZERO);
    }

    #[test]
    fn test_slow_reduces_step() {
        let (mut world, runner) = setup();
        let (mut slowed, slowed_id) = setup();
        slowed.combatant_mut(slowed_id).expect("present").statuses.slow =
            Some(Slow { remaining: 10, percent: 50 });

        move_combatants(&mut world).expect("movement");
        move_combatants(&mut slowed).expect("movement");

        let fast = world.combatant(runner).expect("present").position.x;
        let slow = slowed.combatant(slowed_id).expect("present").position.x;
        assert!(slow > fast);
    }

    #[test]
    fn test_enemy_stops_in_range() {
        let (mut world, runner) = setup();
        let objective = world.objectives[0].expect("objective");
        {
            let r = world.combatant_mut(runner).expect("present");
            r.position = FixedVec2::from_ints(3, 0);
            r.target = Some(objective);
        }
        move_combatants(&mut world).expect("movement");
        // range 1 + objective radius 2 reaches from x = 3
        assert_eq!(world.combatant(runner).expect("present").position, FixedVec2::from_ints(3, 0));
    }
}
