//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bastion::game::config::{BalanceKnobs, Loadout, SimulationConfig};
use bastion::verify::{IssueRequest, ManualClock, RewardSink, RunRecord, RunTicket, RunVerifier, Submission, VerifierConfig};
use bastion::Simulation;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-credential-secret";

/// Objective health high enough that the first waves never break through.
pub const STURDY_HEALTH: i32 = 30_000;

/// Records every grant.
#[derive(Default)]
pub struct CountingRewards {
    pub granted: Mutex<Vec<Uuid>>,
}

impl CountingRewards {
    pub fn count(&self) -> usize {
        self.granted.lock().unwrap().len()
    }
}

impl RewardSink for CountingRewards {
    fn grant(&self, record: &RunRecord) {
        self.granted.lock().unwrap().push(record.run_id);
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub rewards: Arc<CountingRewards>,
    pub verifier: RunVerifier,
}

pub fn verifier_config() -> VerifierConfig {
    VerifierConfig {
        credential_secret: SECRET.into(),
        audit_secret: "integration-test-audit-secret".into(),
        ..VerifierConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(verifier_config())
}

pub fn harness_with(config: VerifierConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let rewards = Arc::new(CountingRewards::default());
    let verifier = RunVerifier::new(config, clock.clone(), rewards.clone()).unwrap();
    Harness { clock, rewards, verifier }
}

/// Starter loadout, objective that survives well past tick 2400.
pub fn sturdy_request() -> IssueRequest {
    IssueRequest {
        balance: BalanceKnobs { base_health: STURDY_HEALTH, ..BalanceKnobs::default() },
        ..IssueRequest::starter()
    }
}

/// No defenders and a one-point objective: lost to the first enemy.
pub fn doomed_request() -> IssueRequest {
    IssueRequest {
        loadout: Loadout::default(),
        balance: BalanceKnobs { base_health: 1, ..BalanceKnobs::default() },
        ..IssueRequest::starter()
    }
}

pub fn sturdy_config() -> SimulationConfig {
    SimulationConfig {
        balance: BalanceKnobs { base_health: STURDY_HEALTH, ..BalanceKnobs::default() },
        ..SimulationConfig::default()
    }
}

/// Play a ticket honestly with no player input.
pub fn play(ticket: &RunTicket) -> Simulation {
    let mut sim = Simulation::new(ticket.seed, ticket.config.clone()).unwrap();
    sim.run_to_end().unwrap();
    sim
}

/// Honest submission for a ticket.
pub fn honest_submission(ticket: &RunTicket) -> Submission {
    let sim = play(ticket);
    Submission::from_simulation(ticket.credential.clone(), &sim, ticket.audit_ticks.as_deref()).unwrap()
}
