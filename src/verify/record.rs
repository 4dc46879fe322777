//! Run Records
//!
//! One [`RunRecord`] per issued run, held in a [`RunRegistry`]. Status moves
//! only forward:
//!
//! ```text
//! Issued ──► Submitted ──► Verifying ──► Verified
//!   │             │             └──────► Rejected
//!   │             └────────────────────► Rejected   (expired, version)
//!   └──► Cancelled
//! ```
//!
//! Every transition is a compare-and-swap under the registry's write lock,
//! so two concurrent submissions of one run cannot both get past `Issued`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::game::config::SimulationConfig;
use crate::proof::replay::RunSummary;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Credential handed out, nothing submitted yet.
    Issued,
    /// A submission claimed the run.
    Submitted,
    /// Replay in progress.
    Verifying,
    /// Replay agreed with every claim.
    Verified,
    /// Submission refused; see the record's reason.
    Rejected,
    /// Abandoned by the player before submission.
    Cancelled,
}

impl RunStatus {
    /// No further transitions possible.
    pub fn is_final(self) -> bool {
        matches!(self, RunStatus::Verified | RunStatus::Rejected | RunStatus::Cancelled)
    }
}

/// Why a submission was rejected. The only detail the client ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Submitted after the credential's TTL.
    Expired,
    /// Issued for a different pipeline version.
    EngineVersionMismatch,
    /// Event log failed structural validation.
    InvalidEvent,
    /// An event is scheduled outside the run.
    TickOverrun,
    /// Replay could not complete.
    ReplayFailure,
    /// No claimed checkpoint for an audited tick.
    MissingCheckpoint,
    /// A claimed hash differs from the replay.
    HashMismatch,
    /// Claimed score or summary differs from the replay.
    ScoreMismatch,
}

impl RejectReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Expired => "expired",
            RejectReason::EngineVersionMismatch => "engine_version_mismatch",
            RejectReason::InvalidEvent => "invalid_event",
            RejectReason::TickOverrun => "tick_overrun",
            RejectReason::ReplayFailure => "replay_failure",
            RejectReason::MissingCheckpoint => "missing_checkpoint",
            RejectReason::HashMismatch => "hash_mismatch",
            RejectReason::ScoreMismatch => "score_mismatch",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side detail behind a rejection. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Tick where the submission diverged, when known
    pub tick: Option<u32>,
    /// Free-form detail
    pub detail: String,
}

impl Diagnostics {
    /// Detail without a tick.
    pub fn new(detail: impl Into<String>) -> Self {
        Self { tick: None, detail: detail.into() }
    }

    /// Detail pinned to a tick.
    pub fn at(tick: u32, detail: impl Into<String>) -> Self {
        Self { tick: Some(tick), detail: detail.into() }
    }
}

/// Result returned to the submitting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Run id
    pub run_id: Uuid,
    /// Did the run verify?
    pub verified: bool,
    /// Why not, if it didn't
    pub reject_reason: Option<RejectReason>,
}

/// Everything persisted about one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id
    pub run_id: Uuid,
    /// Run seed
    pub seed: i32,
    /// Config snapshot the run was issued with
    pub config: SimulationConfig,
    /// Hex digest of `config`, as bound into the credential
    pub config_digest: String,
    /// Ticks whose checkpoints are compared, ascending
    pub audit_ticks: Vec<u32>,
    /// Issuance time (Unix seconds)
    pub issued_at: u64,
    /// Credential expiry (Unix seconds)
    pub expires_at: u64,
    /// Lifecycle status
    pub status: RunStatus,
    /// Set when rejected
    pub reject_reason: Option<RejectReason>,
    /// Set when rejected
    pub diagnostics: Option<Diagnostics>,
    /// Score the client claimed
    pub claimed_score: Option<u32>,
    /// Summary the client claimed, kept for audit even when rejected
    pub claimed_summary: Option<RunSummary>,
    /// Score recomputed by replay; only set when verified
    pub verified_score: Option<u32>,
    /// Final tick reached by the replay
    pub end_tick: Option<u32>,
    /// When the run was finalized (Unix seconds)
    pub finalized_at: Option<u64>,
}

impl RunRecord {
    /// Fresh record in `Issued`.
    pub fn issued(
        run_id: Uuid,
        seed: i32,
        config: SimulationConfig,
        config_digest: String,
        audit_ticks: Vec<u32>,
        issued_at: u64,
        expires_at: u64,
    ) -> Self {
        Self {
            run_id,
            seed,
            config,
            config_digest,
            audit_ticks,
            issued_at,
            expires_at,
            status: RunStatus::Issued,
            reject_reason: None,
            diagnostics: None,
            claimed_score: None,
            claimed_summary: None,
            verified_score: None,
            end_tick: None,
            finalized_at: None,
        }
    }

    /// Client-facing view of a finalized record.
    pub fn outcome(&self) -> Option<SubmissionOutcome> {
        match self.status {
            RunStatus::Verified => Some(SubmissionOutcome {
                run_id: self.run_id,
                verified: true,
                reject_reason: None,
            }),
            RunStatus::Rejected => Some(SubmissionOutcome {
                run_id: self.run_id,
                verified: false,
                reject_reason: self.reject_reason,
            }),
            _ => None,
        }
    }

    /// Counts toward rewards and leaderboards?
    pub fn is_rewardable(&self) -> bool {
        self.status == RunStatus::Verified
    }
}

/// How a run is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Replay agreed; the recomputed score and final tick.
    Verified {
        /// Score from the replay
        score: u32,
        /// Final tick of the replay
        end_tick: u32,
    },
    /// Submission refused.
    Rejected {
        /// Client-visible reason
        reason: RejectReason,
        /// Server-side detail
        diagnostics: Diagnostics,
    },
}

/// In-memory run store with compare-and-swap transitions.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<BTreeMap<Uuid, RunRecord>>,
}

impl RunRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly issued record.
    pub async fn insert(&self, record: RunRecord) {
        let mut runs = self.runs.write().await;
        runs.insert(record.run_id, record);
    }

    /// Snapshot of a record.
    pub async fn get(&self, run_id: &Uuid) -> Option<RunRecord> {
        let runs = self.runs.read().await;
        runs.get(run_id).cloned()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Is the registry empty?
    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    /// Move a run from `from` to `to` if it is currently in `from`.
    ///
    /// Returns the updated record, or the status actually found.
    pub async fn transition(
        &self,
        run_id: &Uuid,
        from: RunStatus,
        to: RunStatus,
    ) -> Result<RunRecord, Option<RunStatus>> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or(None)?;
        if record.status != from {
            return Err(Some(record.status));
        }
        record.status = to;
        Ok(record.clone())
    }

    /// Claim an issued run for a submission, remembering what it claimed.
    pub async fn claim(
        &self,
        run_id: &Uuid,
        claimed_score: u32,
        claimed_summary: RunSummary,
    ) -> Result<RunRecord, Option<RunStatus>> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or(None)?;
        if record.status != RunStatus::Issued {
            return Err(Some(record.status));
        }
        record.status = RunStatus::Submitted;
        record.claimed_score = Some(claimed_score);
        record.claimed_summary = Some(claimed_summary);
        Ok(record.clone())
    }

    /// Finalize an in-flight run.
    ///
    /// Only succeeds from `Submitted` or `Verifying`, so each run is
    /// finalized at most once.
    pub async fn finalize(
        &self,
        run_id: &Uuid,
        verdict: Verdict,
        now: u64,
    ) -> Result<RunRecord, Option<RunStatus>> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or(None)?;
        if !matches!(record.status, RunStatus::Submitted | RunStatus::Verifying) {
            return Err(Some(record.status));
        }
        match verdict {
            Verdict::Verified { score, end_tick } => {
                record.status = RunStatus::Verified;
                record.verified_score = Some(score);
                record.end_tick = Some(end_tick);
            }
            Verdict::Rejected { reason, diagnostics } => {
                record.status = RunStatus::Rejected;
                record.reject_reason = Some(reason);
                record.diagnostics = Some(diagnostics);
            }
        }
        record.finalized_at = Some(now);
        Ok(record.clone())
    }

    /// Verified runs, best score first. What a leaderboard would read.
    pub async fn leaderboard(&self) -> Vec<(Uuid, u32)> {
        let runs = self.runs.read().await;
        let mut board: Vec<(Uuid, u32)> = runs
            .values()
            .filter(|r| r.is_rewardable())
            .filter_map(|r| r.verified_score.map(|s| (r.run_id, s)))
            .collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        board
    }
}

// =============================================================================
// TESTS
// =============================================================================
