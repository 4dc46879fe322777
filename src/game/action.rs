//! Player Events
//!
//! The discrete actions a player schedules during a run, and the two layers
//! of checks they pass through:
//!
//! - **Structural** ([`validate_log`]): ordering, uniqueness, size and payload
//!   ranges. Needs no world state; the verifier runs it before any replay.
//! - **State-dependent** ([`apply_event`]): is a prompt open, is the ability
//!   ready, is the target in range. Failing events are dropped with a
//!   [`DropReason`] and counted in the hashed world state; the run goes on.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::FixedVec2;
use crate::game::ability;
use crate::game::config::MAX_ABILITY_SLOTS;
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{GameMode, WorldState};
use crate::game::stats::Side;
use crate::game::tick::TickContext;
use crate::game::waves;

/// Longest accepted event log.
pub const MAX_EVENTS: usize = 4096;

/// Number of options on a choice prompt.
pub const PROMPT_OPTIONS: u8 = 3;

/// What the player did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Take one of the prompt's options.
    ChooseUpgrade {
        /// Option index (0..3)
        option: u8,
    },
    /// Redraw the prompt's options.
    Reroll,
    /// Cast the ability in a loadout slot at a point.
    ActivateAbility {
        /// Loadout slot (0..8)
        slot: u8,
        /// Target point
        target: FixedVec2,
    },
}

/// A recorded player action. Immutable once logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEvent {
    /// Submission order; breaks ties between events on the same tick
    pub seq: u32,
    /// Tick during which the event applies (1-based)
    pub tick: u32,
    /// The action
    pub action: PlayerAction,
}

impl PlayerEvent {
    /// Create an event.
    pub fn new(seq: u32, tick: u32, action: PlayerAction) -> Self {
        Self { seq, tick, action }
    }

    /// Ordering key within a log.
    #[inline]
    pub fn key(&self) -> (u32, u32) {
        (self.tick, self.seq)
    }
}

/// Why a structurally invalid log was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogViolation {
    /// More than [`MAX_EVENTS`] entries.
    #[error("log has {0} events")]
    TooLong(usize),
    /// Not sorted by (tick, seq).
    #[error("event seq {seq} out of order")]
    Unordered {
        /// Offending seq
        seq: u32,
    },
    /// A seq appears twice.
    #[error("duplicate seq {seq}")]
    DuplicateSeq {
        /// Offending seq
        seq: u32,
    },
    /// Payload outside its range.
    #[error("event seq {seq} has an out-of-range payload")]
    BadPayload {
        /// Offending seq
        seq: u32,
    },
    /// Event tick outside `1..=max_ticks`.
    #[error("event seq {seq} scheduled at tick {tick}")]
    TickOutOfRange {
        /// Offending seq
        seq: u32,
        /// Its tick
        tick: u32,
    },
}

/// Structural validation of a whole log.
///
/// Tick-range problems are only reported when the log is otherwise well
/// formed, so callers can map them to a distinct rejection.
pub fn validate_log(events: &[PlayerEvent], max_ticks: u32) -> Result<(), LogViolation> {
    if events.len() > MAX_EVENTS {
        return Err(LogViolation::TooLong(events.len()));
    }

    let mut seqs: Vec<u32> = Vec::with_capacity(events.len());
    for pair in events.windows(2) {
        if pair[1].key() < pair[0].key() {
            return Err(LogViolation::Unordered { seq: pair[1].seq });
        }
    }
    for event in events {
        let payload_ok = match event.action {
            PlayerAction::ChooseUpgrade { option } => option < PROMPT_OPTIONS,
            PlayerAction::Reroll => true,
            PlayerAction::ActivateAbility { slot, target } => {
                (slot as usize) < MAX_ABILITY_SLOTS && target.is_in_arena()
            }
        };
        if !payload_ok {
            return Err(LogViolation::BadPayload { seq: event.seq });
        }
        seqs.push(event.seq);
    }
    seqs.sort_unstable();
    if let Some(pair) = seqs.windows(2).find(|p| p[0] == p[1]) {
        return Err(LogViolation::DuplicateSeq { seq: pair[0] });
    }

    if let Some(bad) = events.iter().find(|e| e.tick == 0 || e.tick > max_ticks) {
        return Err(LogViolation::TickOutOfRange { seq: bad.seq, tick: bad.tick });
    }
    Ok(())
}

/// Why an event was dropped during its tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// No choice prompt is open.
    NoPromptOpen,
    /// The prompt has no rerolls left.
    NoRerollsLeft,
    /// The option index is outside the prompt.
    BadOption,
    /// No ability is equipped in that slot.
    UnknownSlot,
    /// The ability is still cooling down.
    AbilityOnCooldown,
    /// The target point is too far from the objective.
    TargetOutOfRange,
    /// The action does not exist in this game mode.
    WrongMode,
}

/// A dropped event and the reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedEvent {
    /// Event sequence number
    pub seq: u32,
    /// Tick it was scheduled for
    pub tick: u32,
    /// Why it was dropped
    pub reason: DropReason,
}

/// Apply one event during its tick (pipeline step 1).
///
/// State-dependent failures drop the event; only driver bugs (an event handed
/// to the wrong tick) are errors.
pub fn apply_event(
    world: &mut WorldState,
    event: &PlayerEvent,
    ctx: &mut TickContext<'_>,
) -> Result<(), SimError> {
    if event.tick != world.tick {
        return Err(SimError::Invariant("event applied on the wrong tick"));
    }

    match try_apply(world, event, ctx)? {
        Ok(()) => {
            world.events_applied = world.events_applied.saturating_add(1);
        }
        Err(reason) => {
            world.events_dropped = world.events_dropped.saturating_add(1);
            ctx.dropped.push(DroppedEvent { seq: event.seq, tick: event.tick, reason });
            ctx.events.push(GameEvent::dropped(world.tick, event.seq, reason));
        }
    }
    Ok(())
}

fn try_apply(
    world: &mut WorldState,
    event: &PlayerEvent,
    ctx: &mut TickContext<'_>,
) -> Result<Result<(), DropReason>, SimError> {
    if world.mode != GameMode::Defense {
        return Ok(Err(DropReason::WrongMode));
    }

    match event.action {
        PlayerAction::ChooseUpgrade { option } => {
            let Some(prompt) = world.prompt else {
                return Ok(Err(DropReason::NoPromptOpen));
            };
            let Some(&upgrade) = prompt.options.get(option as usize) else {
                return Ok(Err(DropReason::BadOption));
            };
            world.prompt = None;
            waves::apply_upgrade(world, upgrade, ctx)?;
            ctx.events.push(GameEvent::player_action(
                world.tick,
                GameEventData::UpgradeChosen { upgrade },
            ));
            Ok(Ok(()))
        }
        PlayerAction::Reroll => {
            let Some(mut prompt) = world.prompt else {
                return Ok(Err(DropReason::NoPromptOpen));
            };
            if prompt.rerolls_left == 0 {
                return Ok(Err(DropReason::NoRerollsLeft));
            }
            prompt.rerolls_left -= 1;
            prompt.options = waves::draw_options(&mut world.rng);
            world.prompt = Some(prompt);
            ctx.events.push(GameEvent::progression(
                world.tick,
                GameEventData::PromptOpened { wave: prompt.wave, options: prompt.options },
            ));
            Ok(Ok(()))
        }
        PlayerAction::ActivateAbility { slot, target } => {
            match ability::check_cast(world, Side::Home, slot, target) {
                Ok(index) => {
                    ability::cast(world, index, target, false, ctx)?;
                    Ok(Ok(()))
                }
                Err(reason) => Ok(Err(reason)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choose(seq: u32, tick: u32) -> PlayerEvent {
        PlayerEvent::new(seq, tick, PlayerAction::ChooseUpgrade { option: 0 })
    }

    #[test]
    fn test_valid_log() {
        let log = vec![choose(0, 5), choose(1, 5), choose(2, 9)];
        assert_eq!(validate_log(&log, 100), Ok(()));
        assert_eq!(validate_log(&[], 100), Ok(()));
    }

    #[test]
    fn test_unordered_log() {
        let log = vec![choose(0, 9), choose(1, 5)];
        assert_eq!(validate_log(&log, 100), Err(LogViolation::Unordered { seq: 1 }));

        let same_tick = vec![choose(3, 5), choose(2, 5)];
        assert_eq!(validate_log(&same_tick, 100), Err(LogViolation::Unordered { seq: 2 }));
    }

    #[test]
    fn test_duplicate_seq() {
        let log = vec![choose(4, 5), choose(4, 6)];
        assert_eq!(validate_log(&log, 100), Err(LogViolation::DuplicateSeq { seq: 4 }));
    }

    #[test]
    fn test_payload_ranges() {
        let bad_option = vec![PlayerEvent::new(0, 1, PlayerAction::ChooseUpgrade { option: 3 })];
        assert_eq!(validate_log(&bad_option, 100), Err(LogViolation::BadPayload { seq: 0 }));

        let bad_slot = vec![PlayerEvent::new(
            0,
            1,
            PlayerAction::ActivateAbility { slot: 8, target: FixedVec2::ZERO },
        )];
        assert_eq!(validate_log(&bad_slot, 100), Err(LogViolation::BadPayload { seq: 0 }));

        let off_map = vec![PlayerEvent::new(
            0,
            1,
            PlayerAction::ActivateAbility { slot: 0, target: FixedVec2::from_ints(41, 0) },
        )];
        assert_eq!(validate_log(&off_map, 100), Err(LogViolation::BadPayload { seq: 0 }));
    }

    #[test]
    fn test_tick_range() {
        assert_eq!(
            validate_log(&[choose(0, 0)], 100),
            Err(LogViolation::TickOutOfRange { seq: 0, tick: 0 })
        );
        assert_eq!(
            validate_log(&[choose(0, 101)], 100),
            Err(LogViolation::TickOutOfRange { seq: 0, tick: 101 })
        );
        assert_eq!(validate_log(&[choose(0, 100)], 100), Ok(()));
    }

    #[test]
    fn test_too_long() {
        let log: Vec<_> = (0..(MAX_EVENTS as u32 + 1)).map(|i| choose(i, 1)).collect();
        assert_eq!(validate_log(&log, 100), Err(LogViolation::TooLong(MAX_EVENTS + 1)));
    }
}
