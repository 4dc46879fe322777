//! End-to-end verifier behavior: issue, play, submit.

mod common;

use std::time::Duration;

use bastion::game::action::{PlayerAction, PlayerEvent};
use bastion::verify::{RejectReason, RunStatus, RunVerifier, SubmissionError, VerifierConfig};
use common::*;

#[tokio::test]
async fn honest_run_is_verified_and_rewarded() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let audit = ticket.audit_ticks.clone().unwrap();
    assert!((3..=5).contains(&audit.len()));

    let outcome = h.verifier.submit(honest_submission(&ticket)).await.unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.reject_reason, None);

    let record = h.verifier.record(&ticket.run_id).await.unwrap();
    assert_eq!(record.status, RunStatus::Verified);
    assert_eq!(record.verified_score, record.claimed_score);
    assert_eq!(h.rewards.count(), 1);
    assert_eq!(h.verifier.registry().leaderboard().await.len(), 1);
}

#[tokio::test]
async fn resubmission_returns_stored_result_without_rewards() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    let first = h.verifier.submit(submission.clone()).await.unwrap();
    let second = h.verifier.submit(submission).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.rewards.count(), 1);
    assert_eq!(h.verifier.replays_run(), 1);
}

#[tokio::test]
async fn concurrent_submissions_grant_once() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    let (a, b) = tokio::join!(
        h.verifier.submit(submission.clone()),
        h.verifier.submit(submission.clone())
    );

    let verified = [&a, &b].iter().filter(|r| matches!(r, Ok(o) if o.verified)).count();
    let busy = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(SubmissionError::InProgress(_))))
        .count();
    assert!(verified >= 1);
    assert_eq!(verified + busy, 2);
    assert_eq!(h.rewards.count(), 1);
    assert_eq!(h.verifier.replays_run(), 1);
}

#[tokio::test]
async fn abandoned_submission_still_reaches_a_verdict() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    // the caller gives up while the replay is in flight
    let _ = tokio::time::timeout(Duration::from_millis(1), h.verifier.submit(submission.clone())).await;

    let mut status = RunStatus::Issued;
    for _ in 0..1000 {
        status = h.verifier.record(&ticket.run_id).await.unwrap().status;
        if status.is_final() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, RunStatus::Verified);
    assert_eq!(h.rewards.count(), 1);

    let again = h.verifier.submit(submission).await.unwrap();
    assert!(again.verified);
    assert_eq!(h.rewards.count(), 1);
    assert_eq!(h.verifier.replays_run(), 1);
}

#[tokio::test]
async fn late_submission_expires_without_replay() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    h.clock.advance(verifier_config().run_ttl_secs + 1);
    let outcome = h.verifier.submit(submission).await.unwrap();

    assert!(!outcome.verified);
    assert_eq!(outcome.reject_reason, Some(RejectReason::Expired));
    assert_eq!(h.verifier.replays_run(), 0);
    assert_eq!(h.rewards.count(), 0);

    // the claim is kept for audit
    let record = h.verifier.record(&ticket.run_id).await.unwrap();
    assert!(record.claimed_summary.is_some());
}

#[tokio::test]
async fn submission_at_ttl_boundary_is_accepted() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    h.clock.advance(verifier_config().run_ttl_secs);
    assert!(h.verifier.submit(submission).await.unwrap().verified);
}

#[tokio::test]
async fn engine_upgrade_rejects_old_runs_before_replay() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    let upgraded = RunVerifier::with_registry(
        VerifierConfig { engine_version: ticket.engine_version + 1, ..verifier_config() },
        h.verifier.registry().clone(),
        h.clock.clone(),
        h.rewards.clone(),
    )
    .unwrap();

    let outcome = upgraded.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::EngineVersionMismatch));
    assert_eq!(upgraded.replays_run(), 0);
}

#[tokio::test]
async fn wrong_hash_at_late_audit_tick_is_rejected() {
    let h = harness();
    let ticket = h
        .verifier
        .issue_with_audit_ticks(sturdy_request(), vec![150, 900, 2400])
        .await
        .unwrap();
    let mut submission = honest_submission(&ticket);
    let ticks: Vec<u32> = submission.checkpoints.iter().map(|c| c.tick).collect();
    assert_eq!(ticks, vec![150, 900, 2400]);

    let late = submission.checkpoints.iter_mut().find(|c| c.tick == 2400).unwrap();
    late.chain ^= 1;

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::HashMismatch));

    let record = h.verifier.record(&ticket.run_id).await.unwrap();
    assert_eq!(record.status, RunStatus::Rejected);
    assert_eq!(record.diagnostics.and_then(|d| d.tick), Some(2400));
    assert!(h.verifier.registry().leaderboard().await.is_empty());
    assert_eq!(h.rewards.count(), 0);
}

#[tokio::test]
async fn missing_audit_checkpoint_is_rejected() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let mut submission = honest_submission(&ticket);
    submission.checkpoints.remove(0);

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::MissingCheckpoint));
}

#[tokio::test]
async fn wrong_final_hash_is_rejected() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let mut submission = honest_submission(&ticket);
    submission.final_hash ^= 0x8000_0000;

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::HashMismatch));
}

#[tokio::test]
async fn inflated_score_is_rejected() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let mut submission = honest_submission(&ticket);
    submission.score += 500;

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::ScoreMismatch));
}

#[tokio::test]
async fn malformed_log_is_rejected_without_replay() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let mut submission = honest_submission(&ticket);
    submission.events = vec![PlayerEvent::new(0, 10, PlayerAction::ChooseUpgrade { option: 7 })];

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::InvalidEvent));
    assert_eq!(h.verifier.replays_run(), 0);
}

#[tokio::test]
async fn event_beyond_tick_limit_is_overrun() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    let mut submission = honest_submission(&ticket);
    submission.events = vec![PlayerEvent::new(0, ticket.config.max_ticks + 1, PlayerAction::Reroll)];

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::TickOverrun));
}

#[tokio::test]
async fn event_after_run_ended_is_overrun() {
    let h = harness();
    let ticket = h.verifier.issue(doomed_request()).await.unwrap();
    let sim = play(&ticket);
    assert!(sim.current_tick() < 20_000);

    let mut submission = honest_submission(&ticket);
    submission.events.push(PlayerEvent::new(0, 20_000, PlayerAction::Reroll));

    let outcome = h.verifier.submit(submission).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::TickOverrun));
}

#[tokio::test]
async fn credential_from_another_server_is_refused() {
    let h = harness();
    let other = harness_with(VerifierConfig {
        credential_secret: "some-other-deployment-secret".into(),
        ..verifier_config()
    });
    let ticket = other.verifier.issue(sturdy_request()).await.unwrap();
    let submission = honest_submission(&ticket);

    let err = h.verifier.submit(submission).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Credential(_)));
}

#[tokio::test]
async fn hidden_audit_schedule_checks_full_checkpoint_list() {
    let h = harness_with(VerifierConfig { disclose_audit_ticks: false, ..verifier_config() });
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    assert!(ticket.audit_ticks.is_none());

    let honest = honest_submission(&ticket);
    assert_eq!(honest.checkpoints[0].tick, 0);

    let audited = h.verifier.record(&ticket.run_id).await.unwrap().audit_ticks;
    let mut forged = honest.clone();
    let target = forged.checkpoints.iter_mut().find(|c| c.tick == audited[0]).unwrap();
    target.hash ^= 1;

    let outcome = h.verifier.submit(forged).await.unwrap();
    assert_eq!(outcome.reject_reason, Some(RejectReason::HashMismatch));
}

#[tokio::test]
async fn cancelled_run_cannot_be_submitted() {
    let h = harness();
    let ticket = h.verifier.issue(sturdy_request()).await.unwrap();
    h.verifier.cancel(&ticket.credential).await.unwrap();

    let err = h.verifier.submit(honest_submission(&ticket)).await.unwrap_err();
    assert_eq!(err, SubmissionError::Cancelled(ticket.run_id));
    assert_eq!(h.verifier.replays_run(), 0);
}
