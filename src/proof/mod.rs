//! Run Proof System
//!
//! Provides verifiable run outcomes through:
//! - Per-tick state hashes folded into a tamper-evident chain
//! - Sparse checkpoint retention for audit
//! - Verification by deterministic replay
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  chain.rs    - Checkpoints and the append-only hash chain   │
//! │  replay.rs   - Live driver and pure replay function         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod chain;
pub mod replay;

// Re-export key types
pub use chain::{checkpoint_at, ChainRecorder, Checkpoint};
pub use replay::{replay, ReplayOutcome, RunSummary, Simulation};
