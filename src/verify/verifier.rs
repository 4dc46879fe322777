//! Run Verifier
//!
//! Issues runs and decides whether a submitted run is genuine by replaying
//! it. The client's arithmetic is never trusted: the server recomputes the
//! hash chain from the persisted seed and config plus the submitted event
//! log, then compares a few audited checkpoints and the final hash.
//!
//! Checks run cheapest first, so an expired or stale submission never costs
//! a replay:
//!
//! 1. credential signature and binding to the stored run
//! 2. claim (`Issued -> Submitted`, compare-and-swap)
//! 3. expiry, engine version
//! 4. structural log validation
//! 5. replay on a blocking worker
//! 6. events past the end, audited checkpoints, final hash, score

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::core::rng::{audit_rng, derive_run_seed, DeterministicRng};
use crate::game::action::{validate_log, LogViolation, PlayerEvent};
use crate::game::config::{
    BalanceKnobs, Loadout, ProgressionBonuses, SimulationConfig, Unlocks, ENGINE_VERSION,
};
use crate::game::error::SimError;
use crate::proof::chain::{checkpoint_at, Checkpoint};
use crate::proof::replay::{replay, RunSummary, Simulation};
use crate::verify::credential::{CredentialError, CredentialSigner, RunClaims};
use crate::verify::record::{
    Diagnostics, RejectReason, RunRecord, RunRegistry, RunStatus, SubmissionOutcome, Verdict,
};

/// Default credential lifetime: 30 minutes.
pub const DEFAULT_RUN_TTL_SECS: u64 = 30 * 60;

/// Fewest audit ticks drawn per run.
pub const MIN_AUDIT_TICKS: u32 = 3;

/// Most audit ticks drawn per run.
pub const MAX_AUDIT_TICKS: u32 = 5;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Verifier configuration.
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    /// HS256 secret for run credentials
    pub credential_secret: String,
    /// Issuer claim stamped into credentials
    pub issuer: String,
    /// Credential lifetime in seconds
    pub run_ttl_secs: u64,
    /// Tell the client which ticks will be audited
    pub disclose_audit_ticks: bool,
    /// Secret behind run seeds and audit tick selection.
    /// Falls back to the credential secret when empty.
    pub audit_secret: String,
    /// Pipeline version this server replays with
    pub engine_version: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            credential_secret: String::new(),
            issuer: "bastion".into(),
            run_ttl_secs: DEFAULT_RUN_TTL_SECS,
            disclose_audit_ticks: true,
            audit_secret: String::new(),
            engine_version: ENGINE_VERSION,
        }
    }
}

impl VerifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            credential_secret: std::env::var("BASTION_CREDENTIAL_SECRET").unwrap_or_default(),
            issuer: std::env::var("BASTION_CREDENTIAL_ISSUER").unwrap_or(defaults.issuer),
            run_ttl_secs: std::env::var("BASTION_RUN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.run_ttl_secs),
            disclose_audit_ticks: std::env::var("BASTION_DISCLOSE_AUDIT_TICKS")
                .map(|v| !(v == "false" || v == "0"))
                .unwrap_or(defaults.disclose_audit_ticks),
            audit_secret: std::env::var("BASTION_AUDIT_SECRET").unwrap_or_default(),
            engine_version: defaults.engine_version,
        }
    }

    /// Check if signing is configured.
    pub fn is_configured(&self) -> bool {
        !self.credential_secret.is_empty()
    }
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Source of wall-clock time (Unix seconds).
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> u64;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: u64) -> Self {
        Self { now: AtomicU64::new(start) }
    }

    /// Jump to `now`.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Downstream reward system. Called exactly once per verified run.
pub trait RewardSink: Send + Sync {
    /// Grant rewards for a verified run.
    fn grant(&self, record: &RunRecord);
}

// =============================================================================
// REQUESTS & RESPONSES
// =============================================================================

/// What the progression service hands over when a run starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Content the account has unlocked
    pub unlocks: Unlocks,
    /// Loadout the player chose
    pub loadout: Loadout,
    /// Balance knobs in force
    pub balance: BalanceKnobs,
    /// Account bonuses
    pub bonuses: ProgressionBonuses,
}

impl IssueRequest {
    /// Everything unlocked, starter loadout, default balance.
    pub fn starter() -> Self {
        Self {
            unlocks: Unlocks::all(),
            loadout: Loadout::starter(),
            balance: BalanceKnobs::default(),
            bonuses: ProgressionBonuses::default(),
        }
    }
}

/// What the client receives at issuance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunTicket {
    /// Run id
    pub run_id: Uuid,
    /// Signed credential to present at submission
    pub credential: String,
    /// Run seed
    pub seed: i32,
    /// Pipeline version
    pub engine_version: u32,
    /// Ticks per second
    pub tick_rate: u32,
    /// Waves in the run
    pub max_waves: u32,
    /// Audited ticks, when disclosed
    pub audit_ticks: Option<Vec<u32>>,
    /// Account bonuses in force
    pub bonuses: ProgressionBonuses,
    /// Full config snapshot to simulate with
    pub config: SimulationConfig,
}

/// What the client posts when the run is over.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    /// Credential from the ticket
    pub credential: String,
    /// Claimed chain hash at the final tick
    pub final_hash: u32,
    /// Claimed score
    pub score: u32,
    /// Claimed tallies
    pub summary: RunSummary,
    /// Full event log, in (tick, seq) order
    pub events: Vec<PlayerEvent>,
    /// Claimed checkpoints: at least every audited tick
    pub checkpoints: Vec<Checkpoint>,
}

impl Submission {
    /// Build the submission for a finished live run.
    ///
    /// With disclosed audit ticks only those checkpoints are sent; otherwise
    /// every retained checkpoint is. `None` if the run has not ended.
    pub fn from_simulation(credential: String, sim: &Simulation, audit_ticks: Option<&[u32]>) -> Option<Self> {
        let final_hash = sim.final_hash()?;
        let checkpoints = match audit_ticks {
            Some(ticks) => sim
                .checkpoints()
                .iter()
                .filter(|c| ticks.contains(&c.tick))
                .copied()
                .collect(),
            None => sim.checkpoints().to_vec(),
        };
        Some(Self {
            credential,
            final_hash,
            score: sim.score(),
            summary: sim.summary(),
            events: sim.event_log().to_vec(),
            checkpoints,
        })
    }
}

/// Issuance errors.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The loadout uses content the account has not unlocked.
    #[error("loadout uses locked content: {0}")]
    Locked(String),
    /// The resulting config cannot be simulated.
    #[error(transparent)]
    Config(#[from] SimError),
    /// A fixed audit schedule is malformed.
    #[error("invalid audit schedule: {0}")]
    AuditSchedule(String),
    /// Signing failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Submission errors that never touch the run's status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Credential is invalid or does not match the run.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// No such run.
    #[error("unknown run {0}")]
    UnknownRun(Uuid),
    /// Another submission of this run is being processed.
    #[error("run {0} is already being verified")]
    InProgress(Uuid),
    /// The run was cancelled.
    #[error("run {0} was cancelled")]
    Cancelled(Uuid),
    /// The run can no longer be cancelled.
    #[error("run {run_id} is {status:?} and cannot be cancelled")]
    NotCancellable {
        /// Run id
        run_id: Uuid,
        /// Its status
        status: RunStatus,
    },
}

// =============================================================================
// AUDIT SCHEDULE
// =============================================================================

/// Draw the audit ticks for a run.
///
/// Three to five distinct multiples of the checkpoint interval inside
/// `[interval, audit_horizon]`, ascending. Fewer when the window is small,
/// none when it is shorter than one interval; issuance refuses that.
pub fn select_audit_ticks(rng: &mut DeterministicRng, config: &SimulationConfig) -> Vec<u32> {
    let interval = config.checkpoint_interval.max(1);
    let slots = config.audit_horizon() / interval;
    let count = (MIN_AUDIT_TICKS + rng.next_int(MAX_AUDIT_TICKS - MIN_AUDIT_TICKS + 1)).min(slots);

    let mut candidates: Vec<u32> = (1..=slots).map(|k| k * interval).collect();
    rng.shuffle(&mut candidates);
    let mut ticks: Vec<u32> = candidates.into_iter().take(count as usize).collect();
    ticks.sort_unstable();
    ticks
}

fn check_audit_schedule(ticks: &[u32], config: &SimulationConfig) -> Result<(), IssueError> {
    if ticks.is_empty() || ticks.len() > MAX_AUDIT_TICKS as usize {
        return Err(IssueError::AuditSchedule(format!("{} ticks", ticks.len())));
    }
    if ticks.windows(2).any(|p| p[0] >= p[1]) {
        return Err(IssueError::AuditSchedule("ticks must be strictly ascending".into()));
    }
    if let Some(bad) = ticks
        .iter()
        .find(|&&t| t == 0 || t > config.max_ticks || t % config.checkpoint_interval != 0)
    {
        return Err(IssueError::AuditSchedule(format!("tick {bad} is not a checkpoint tick")));
    }
    Ok(())
}

// =============================================================================
// VERIFIER
// =============================================================================

/// The run verification service.
pub struct RunVerifier {
    config: VerifierConfig,
    signer: CredentialSigner,
    judge: Arc<Judge>,
}

impl std::fmt::Debug for RunVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunVerifier")
            .field("issuer", &self.config.issuer)
            .field("engine_version", &self.config.engine_version)
            .field("replays", &self.judge.replays)
            .finish_non_exhaustive()
    }
}

/// Everything needed to take a claimed run to a verdict.
///
/// Shared with the task that owns a claimed submission, so the run reaches
/// `finalize` even when the caller goes away mid-verification.
struct Judge {
    registry: Arc<RunRegistry>,
    clock: Arc<dyn Clock>,
    rewards: Arc<dyn RewardSink>,
    replays: AtomicU64,
    engine_version: u32,
}

impl RunVerifier {
    /// Create a verifier with its own registry.
    pub fn new(
        config: VerifierConfig,
        clock: Arc<dyn Clock>,
        rewards: Arc<dyn RewardSink>,
    ) -> Result<Self, CredentialError> {
        Self::with_registry(config, Arc::new(RunRegistry::new()), clock, rewards)
    }

    /// Create a verifier over an existing registry.
    pub fn with_registry(
        config: VerifierConfig,
        registry: Arc<RunRegistry>,
        clock: Arc<dyn Clock>,
        rewards: Arc<dyn RewardSink>,
    ) -> Result<Self, CredentialError> {
        let signer = CredentialSigner::new(&config.credential_secret, config.issuer.clone())?;
        let judge = Arc::new(Judge {
            registry,
            clock,
            rewards,
            replays: AtomicU64::new(0),
            engine_version: config.engine_version,
        });
        Ok(Self { config, signer, judge })
    }

    /// The run store.
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.judge.registry
    }

    /// Replays started so far.
    pub fn replays_run(&self) -> u64 {
        self.judge.replays.load(Ordering::Relaxed)
    }

    /// Snapshot of a run's record.
    pub async fn record(&self, run_id: &Uuid) -> Option<RunRecord> {
        self.judge.registry.get(run_id).await
    }

    fn audit_secret(&self) -> &[u8] {
        if self.config.audit_secret.is_empty() {
            self.config.credential_secret.as_bytes()
        } else {
            self.config.audit_secret.as_bytes()
        }
    }

    /// Issue a run with a freshly drawn audit schedule.
    pub async fn issue(&self, request: IssueRequest) -> Result<RunTicket, IssueError> {
        self.issue_inner(request, None).await
    }

    /// Issue a run with a fixed audit schedule, e.g. for regression fixtures.
    pub async fn issue_with_audit_ticks(
        &self,
        request: IssueRequest,
        audit_ticks: Vec<u32>,
    ) -> Result<RunTicket, IssueError> {
        self.issue_inner(request, Some(audit_ticks)).await
    }

    async fn issue_inner(
        &self,
        request: IssueRequest,
        audit_ticks: Option<Vec<u32>>,
    ) -> Result<RunTicket, IssueError> {
        let config = SimulationConfig {
            engine_version: self.config.engine_version,
            balance: request.balance,
            loadout: request.loadout,
            bonuses: request.bonuses,
            ..SimulationConfig::default()
        };
        config.validate()?;
        if let Some(locked) = request.unlocks.first_locked(&config.loadout) {
            return Err(IssueError::Locked(locked));
        }

        let run_id = Uuid::new_v4();
        let seed = derive_run_seed(self.audit_secret(), run_id.as_bytes());
        let audit_ticks = match audit_ticks {
            Some(ticks) => ticks,
            None => select_audit_ticks(&mut audit_rng(self.audit_secret(), run_id.as_bytes()), &config),
        };
        // a window shorter than one checkpoint interval leaves nothing to audit
        check_audit_schedule(&audit_ticks, &config)?;

        let issued_at = self.judge.clock.now();
        let expires_at = issued_at.saturating_add(self.config.run_ttl_secs);
        let config_digest = config.digest_hex()?;
        let claims = RunClaims {
            sub: run_id.to_string(),
            iss: self.signer.issuer().to_string(),
            iat: issued_at,
            exp: expires_at,
            seed,
            engine_version: config.engine_version,
            config_digest: config_digest.clone(),
        };
        let credential = self.signer.sign(&claims)?;

        self.judge
            .registry
            .insert(RunRecord::issued(
                run_id,
                seed,
                config.clone(),
                config_digest,
                audit_ticks.clone(),
                issued_at,
                expires_at,
            ))
            .await;
        info!(%run_id, seed, audit_ticks = audit_ticks.len(), "run issued");

        Ok(RunTicket {
            run_id,
            credential,
            seed,
            engine_version: config.engine_version,
            tick_rate: config.tick_rate,
            max_waves: config.max_waves,
            audit_ticks: self.config.disclose_audit_ticks.then_some(audit_ticks),
            bonuses: config.bonuses.clone(),
            config,
        })
    }

    /// Abandon an issued run. Never replays anything.
    #[instrument(skip(self, credential))]
    pub async fn cancel(&self, credential: &str) -> Result<(), SubmissionError> {
        let claims = self.signer.validate(credential)?;
        let run_id = claims.run_id()?;
        match self.judge.registry.transition(&run_id, RunStatus::Issued, RunStatus::Cancelled).await {
            Ok(_) => {
                info!(%run_id, "run cancelled");
                Ok(())
            }
            Err(None) => Err(SubmissionError::UnknownRun(run_id)),
            Err(Some(status)) => Err(SubmissionError::NotCancellable { run_id, status }),
        }
    }

    /// Verify a submitted run.
    ///
    /// A run is finalized at most once. Resubmitting a finalized run returns
    /// the stored outcome and grants nothing.
    #[instrument(skip(self, submission), fields(run_id = tracing::field::Empty))]
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome, SubmissionError> {
        let claims = self.signer.validate(&submission.credential)?;
        let run_id = claims.run_id()?;
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let registry = &self.judge.registry;
        let stored = registry.get(&run_id).await.ok_or(SubmissionError::UnknownRun(run_id))?;
        if claims.seed != stored.seed || claims.config_digest != stored.config_digest {
            return Err(CredentialError::RunMismatch.into());
        }

        let record = match registry.claim(&run_id, submission.score, submission.summary).await {
            Ok(record) => record,
            Err(None) => return Err(SubmissionError::UnknownRun(run_id)),
            Err(Some(RunStatus::Cancelled)) => return Err(SubmissionError::Cancelled(run_id)),
            Err(Some(status)) if status.is_final() => {
                debug!(?status, "resubmission of a finalized run");
                return registry
                    .get(&run_id)
                    .await
                    .and_then(|r| r.outcome())
                    .ok_or(SubmissionError::InProgress(run_id));
            }
            Err(Some(_)) => return Err(SubmissionError::InProgress(run_id)),
        };

        // From here on the run is ours: the verdict is reached on a task of
        // its own so dropping this future cannot strand it in flight.
        let judge = Arc::clone(&self.judge);
        let engine_version = claims.engine_version;
        let verdict = async move { judge.adjudicate(record, engine_version, submission).await };
        tokio::spawn(verdict.instrument(tracing::Span::current()))
            .await
            .map_err(|err| {
                warn!(%err, "verification task failed");
                SubmissionError::InProgress(run_id)
            })?
    }
}

impl Judge {
    /// Take a claimed (`Submitted`) run to its verdict.
    async fn adjudicate(
        &self,
        record: RunRecord,
        engine_version: u32,
        submission: Submission,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let run_id = record.run_id;
        let now = self.clock.now();
        if now > record.expires_at {
            let late = now - record.expires_at;
            return self
                .finish(&run_id, rejected(RejectReason::Expired, Diagnostics::new(format!("{late}s past expiry"))))
                .await;
        }
        if engine_version != self.engine_version || record.config.engine_version != self.engine_version {
            let detail = format!("issued for engine v{}, server runs v{}", engine_version, self.engine_version);
            return self
                .finish(&run_id, rejected(RejectReason::EngineVersionMismatch, Diagnostics::new(detail)))
                .await;
        }

        self.registry
            .transition(&run_id, RunStatus::Submitted, RunStatus::Verifying)
            .await
            .map_err(|_| SubmissionError::InProgress(run_id))?;

        let verdict = self.check(&record, submission).await;
        self.finish(&run_id, verdict).await
    }

    /// Replay a claimed run and compare it against the claims.
    async fn check(&self, record: &RunRecord, submission: Submission) -> Verdict {
        let Submission { final_hash, score, summary, events, checkpoints, .. } = submission;

        if let Err(violation) = validate_log(&events, record.config.max_ticks) {
            let reason = match violation {
                LogViolation::TickOutOfRange { .. } => RejectReason::TickOverrun,
                _ => RejectReason::InvalidEvent,
            };
            return rejected(reason, Diagnostics::new(violation.to_string()));
        }

        self.replays.fetch_add(1, Ordering::Relaxed);
        let seed = record.seed;
        let config = record.config.clone();
        let replayed = match tokio::task::spawn_blocking(move || replay(seed, &config, &events)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => return rejected(RejectReason::ReplayFailure, Diagnostics::new(err.to_string())),
            Err(err) => {
                return rejected(RejectReason::ReplayFailure, Diagnostics::new(format!("replay worker: {err}")))
            }
        };
        let end = replayed.end_tick;

        if replayed.events_past_end > 0 {
            let detail = format!("{} events after the run ended", replayed.events_past_end);
            return rejected(RejectReason::TickOverrun, Diagnostics::at(end, detail));
        }

        // audit ticks past the end are covered by the final hash
        for &tick in record.audit_ticks.iter().filter(|&&t| t <= end) {
            let Some(expected) = checkpoint_at(&replayed.checkpoints, tick) else {
                return rejected(RejectReason::ReplayFailure, Diagnostics::at(tick, "audited tick not retained"));
            };
            match checkpoints.iter().find(|c| c.tick == tick) {
                None => {
                    return rejected(RejectReason::MissingCheckpoint, Diagnostics::at(tick, "no claimed checkpoint"));
                }
                Some(claimed) if claimed != expected => {
                    let detail = format!(
                        "claimed chain {}, replay {}",
                        hex::encode(claimed.chain.to_le_bytes()),
                        hex::encode(expected.chain.to_le_bytes())
                    );
                    return rejected(RejectReason::HashMismatch, Diagnostics::at(tick, detail));
                }
                Some(_) => {}
            }
        }

        if final_hash != replayed.final_hash {
            return rejected(RejectReason::HashMismatch, Diagnostics::at(end, "final hash differs"));
        }
        if score != replayed.score || summary != replayed.summary {
            let detail = format!("claimed score {score}, replay {}", replayed.score);
            return rejected(RejectReason::ScoreMismatch, Diagnostics::at(end, detail));
        }

        Verdict::Verified { score: replayed.score, end_tick: end }
    }

    /// Persist a verdict and, for verified runs, grant rewards.
    async fn finish(&self, run_id: &Uuid, verdict: Verdict) -> Result<SubmissionOutcome, SubmissionError> {
        let record = self
            .registry
            .finalize(run_id, verdict, self.clock.now())
            .await
            .map_err(|_| SubmissionError::InProgress(*run_id))?;

        match (record.status, &record.diagnostics) {
            (RunStatus::Verified, _) => {
                info!(score = record.verified_score, end_tick = record.end_tick, "run verified");
                self.rewards.grant(&record);
            }
            (_, Some(diagnostics)) => {
                warn!(
                    reason = %record.reject_reason.map_or("unknown", |r| r.as_str()),
                    tick = ?diagnostics.tick,
                    detail = %diagnostics.detail,
                    "run rejected"
                );
            }
            _ => {}
        }
        record.outcome().ok_or(SubmissionError::InProgress(*run_id))
    }
}

fn rejected(reason: RejectReason, diagnostics: Diagnostics) -> Verdict {
    Verdict::Rejected { reason, diagnostics }
}

// =============================================================================
// TESTS
// =============================================================================
