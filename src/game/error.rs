//! Simulation defects.
//!
//! Anything in here means the pipeline or its inputs are broken. None of these
//! are recovered from inside a run: the tick that raised one never completes,
//! and the replay that hit it is reported as a failure.

use thiserror::Error;

use super::state::EntityId;

/// Fatal simulation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A subsystem referenced an entity that is not in the world.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// A fixed-point division had a zero divisor.
    #[error("division by zero in {0}")]
    DivideByZero(&'static str),

    /// The configuration cannot be simulated.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The event log handed to the driver is not in (tick, seq) order.
    #[error("event log out of order at seq {seq}")]
    UnorderedEvents {
        /// First offending sequence number
        seq: u32,
    },

    /// The run already ended; no further ticks can be simulated.
    #[error("run already ended at tick {0}")]
    RunEnded(u32),

    /// Internal bookkeeping no longer holds.
    #[error("invariant violated: {0}")]
    Invariant(&'static str),
}
