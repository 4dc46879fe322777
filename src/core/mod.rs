//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform determinism.
//! They form the foundation that the simulation, the replay driver and the
//! run verifier all share.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_SCALE};
pub use vec2::{FixedVec2, ARENA_HALF_EXTENT};
pub use rng::DeterministicRng;
pub use hash::{chain_mix, hash32, StateHasher, CHAIN_SEED};
