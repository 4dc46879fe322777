//! Game Logic Module
//!
//! All combat simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `stats`: Content tables (kinds, base stats, modifier constants)
//! - `config`: Run configuration snapshot, loadouts, balance knobs
//! - `state`: World state, combatants, projectiles, zones
//! - `action`: Player events, log validation, event application
//! - `targeting`, `movement`, `combat`, `effects`, `damage`, `waves`,
//!   `ability`: One module per pipeline step
//! - `tick`: Authoritative simulation loop
//! - `events`: Game events for rendering and telemetry

pub mod stats;
pub mod config;
pub mod error;
pub mod state;
pub mod action;
pub mod events;
pub mod targeting;
pub mod movement;
pub mod combat;
pub mod effects;
pub mod damage;
pub mod waves;
pub mod ability;
pub mod tick;

// Re-export key types
pub use action::{DropReason, DroppedEvent, PlayerAction, PlayerEvent};
pub use config::{Loadout, SimulationConfig};
pub use error::SimError;
pub use events::{GameEvent, GameEventData};
pub use state::{EntityId, GameMode, Outcome, WorldState};
pub use stats::Side;
pub use tick::{tick, TickResult};
