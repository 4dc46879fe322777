//! PvP Battles
//!
//! Two builds, one seed, no player input. The same tick pipeline as a run,
//! with waves switched off and both sides fielding an objective.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PVP BATTLES                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  build.rs    - Battle setup, simulation, timeout ranking    │
//! │  resolver.rs - Canonical sides, trophies, claim logging     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod build;
pub mod resolver;

// Re-export key types
pub use build::{simulate_battle, BattleBuildConfig, BattleConfig, BattleReport, SideReport, WinReason};
pub use resolver::{ClaimedResult, PlayerBattleStats, PvpError, PvpRequest, PvpResolution, PvpResolver};
