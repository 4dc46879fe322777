//! # Bastion Server
//!
//! Deterministic combat simulation and run verification for Bastion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BASTION SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic            │
//! │  ├── vec2.rs     - 2D vector with fixed-point               │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG          │
//! │  └── hash.rs     - State hashing and the chain mix          │
//! │                                                             │
//! │  game/           - Combat simulation (deterministic)        │
//! │  ├── config.rs   - Run config snapshot and loadouts         │
//! │  ├── state.rs    - World state and canonical hashing        │
//! │  ├── action.rs   - Player events and validation             │
//! │  ├── tick.rs     - The nine-step tick pipeline              │
//! │  └── ...         - One module per pipeline step             │
//! │                                                             │
//! │  proof/          - Hash chain and replay                    │
//! │  verify/         - Run issuance and verification (async)    │
//! │  pvp/            - Build-vs-build battles                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/`, `game/` and `proof/` modules are **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from one seeded Xorshift128+ stream per run
//!
//! Given identical seed, config and event log, a replay produces
//! **identical checkpoints** on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod proof;
pub mod pvp;
pub mod verify;

// Re-export commonly used types
pub use core::fixed::{Fixed, FIXED_SCALE};
pub use core::vec2::FixedVec2;
pub use core::rng::DeterministicRng;
pub use game::config::{SimulationConfig, ENGINE_VERSION};
pub use game::{Outcome, PlayerAction, PlayerEvent, WorldState};
pub use proof::{replay, Checkpoint, Simulation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = game::config::DEFAULT_TICK_RATE;
