//! Run Verification Service
//!
//! The server side of a run's lifecycle: issuance, submission, replay and
//! the verdict. Everything async lives here; the simulation itself is
//! handed to a blocking worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  VERIFICATION SERVICE                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  credential.rs - Signed, time-bounded run credentials       │
//! │  record.rs     - Run records and the status registry        │
//! │  verifier.rs   - Issue / submit / cancel state machine      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod credential;
pub mod record;
pub mod verifier;

// Re-export key types
pub use credential::{CredentialError, CredentialSigner, RunClaims};
pub use record::{Diagnostics, RejectReason, RunRecord, RunRegistry, RunStatus, SubmissionOutcome};
pub use verifier::{
    Clock, IssueError, IssueRequest, ManualClock, RewardSink, RunTicket, RunVerifier, Submission,
    SubmissionError, SystemClock, VerifierConfig,
};
