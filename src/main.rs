//! Bastion Server
//!
//! Demo driver: issues a run, plays it through the live simulation, has the
//! in-process verifier replay it, then resolves a sample PvP challenge.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use bastion::{
    core::vec2::FixedVec2,
    game::config::{Loadout, ProgressionBonuses},
    game::events::{EventPriority, GameEventData},
    game::Side,
    pvp::{BattleBuildConfig, BattleConfig, PvpRequest, PvpResolver},
    verify::{IssueRequest, RewardSink, RunRecord, RunVerifier, Submission, SystemClock, VerifierConfig},
    Fixed, PlayerAction, Simulation, TICK_RATE, VERSION,
};

/// Prints granted rewards.
struct LogRewards;

impl RewardSink for LogRewards {
    fn grant(&self, record: &RunRecord) {
        info!(
            run_id = %record.run_id,
            score = record.verified_score,
            "rewards granted"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Bastion Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    demo_run().await?;
    demo_battle()?;
    Ok(())
}

/// Issue, play, submit.
async fn demo_run() -> Result<()> {
    info!("=== Starting Demo Run ===");

    let mut config = VerifierConfig::from_env();
    if !config.is_configured() {
        config.credential_secret = "bastion-demo-secret".into();
    }
    let verifier = RunVerifier::new(config, Arc::new(SystemClock), Arc::new(LogRewards))
        .context("verifier setup")?;

    let ticket = verifier.issue(IssueRequest::starter()).await?;
    info!(
        run_id = %ticket.run_id,
        seed = ticket.seed,
        audit_ticks = ?ticket.audit_ticks,
        "ticket received"
    );

    let mut sim = Simulation::new(ticket.seed, ticket.config.clone())?;
    let mut meteor_ready = true;
    while !sim.is_finished() {
        // drop the first meteor on whatever gets close to the objective
        if meteor_ready {
            if let Some(target) = nearest_threat(&sim) {
                sim.submit(PlayerAction::ActivateAbility { slot: 0, target })?;
                meteor_ready = false;
            }
        }
        let result = sim.step()?;
        for event in &result.events {
            if matches!(event.data, GameEventData::PromptOpened { .. }) && !sim.is_finished() {
                sim.submit(PlayerAction::ChooseUpgrade { option: 0 })?;
            }
            if matches!(event.priority, EventPriority::RunEnded | EventPriority::Progression) {
                info!(tick = event.tick, event = ?event.data, "event");
            }
        }
    }

    let outcome = sim.outcome().ok_or_else(|| anyhow!("run did not end"))?;
    info!(
        ?outcome,
        end_tick = sim.current_tick(),
        score = sim.score(),
        final_hash = %sim.final_hash().map(|h| hex::encode(h.to_le_bytes())).unwrap_or_default(),
        "run finished"
    );

    let submission = Submission::from_simulation(ticket.credential.clone(), &sim, ticket.audit_ticks.as_deref())
        .ok_or_else(|| anyhow!("run did not end"))?;
    let verdict = verifier.submit(submission).await?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

/// Position of an enemy within 15 units of the objective, if any.
fn nearest_threat(sim: &Simulation) -> Option<FixedVec2> {
    sim.world()
        .combatants
        .values()
        .find(|c| c.alive && c.side == Side::Away && c.position.within(FixedVec2::ZERO, Fixed::from_int(15)))
        .map(|c| c.position)
}

/// Starter build against a tower-only build.
fn demo_battle() -> Result<()> {
    info!("=== Starting Demo Battle ===");

    let mut towers = Loadout::starter();
    towers.units.clear();
    let request = PvpRequest {
        challenge_id: Uuid::new_v4(),
        seed: 12345,
        builds: [
            BattleBuildConfig {
                owner_id: Uuid::new_v4(),
                loadout: Loadout::starter(),
                bonuses: ProgressionBonuses::default(),
            },
            BattleBuildConfig {
                owner_id: Uuid::new_v4(),
                loadout: towers,
                bonuses: ProgressionBonuses::default(),
            },
        ],
        claimed: None,
    };

    let resolution = PvpResolver::new(BattleConfig::default()).resolve(&request)?;
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
