//! PvP Resolver
//!
//! Resolves a challenge by simulating it server-side. The client simulates
//! the same battle for an instant result and reports what it saw; that claim
//! is logged when it disagrees and otherwise ignored. The server's own
//! recomputation is the only result.
//!
//! Sides are assigned canonically (lower owner id plays Home), so the order
//! in which the two builds arrive never changes the outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::game::error::SimError;
use crate::game::stats::Side;
use crate::pvp::build::{simulate_battle, BattleBuildConfig, BattleConfig, BattleReport, WinReason};

/// What the client says happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedResult {
    /// Claimed winner
    pub winner_id: Option<Uuid>,
    /// Claimed reason
    pub win_reason: WinReason,
    /// Claimed battle length in ticks
    pub duration_ticks: u32,
}

/// A challenge to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvpRequest {
    /// Challenge id
    pub challenge_id: Uuid,
    /// Shared battle seed
    pub seed: i32,
    /// The two builds, in any order
    pub builds: [BattleBuildConfig; 2],
    /// The client's result, if it sent one
    pub claimed: Option<ClaimedResult>,
}

/// One player's end-of-battle numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBattleStats {
    /// Player
    pub owner_id: Uuid,
    /// Side the player was assigned
    pub side: Side,
    /// Remaining objective health
    pub objective_health: i32,
    /// Combatants still standing
    pub units_alive: u32,
    /// Kills
    pub kills: u32,
    /// Losses
    pub losses: u32,
    /// Damage dealt in whole units
    pub damage_dealt: i64,
    /// Trophy change
    pub trophies: i32,
}

/// Authoritative result of a challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvpResolution {
    /// Challenge id
    pub challenge_id: Uuid,
    /// Winning player, if any
    pub winner_id: Option<Uuid>,
    /// How it was decided
    pub win_reason: WinReason,
    /// Battle length in ticks
    pub duration_ticks: u32,
    /// Chain hash at the final tick
    pub final_hash: u32,
    /// When the server resolved it
    pub resolved_at: DateTime<Utc>,
    /// Both players, Home first
    pub players: [PlayerBattleStats; 2],
}

impl PvpResolution {
    /// A player's numbers.
    pub fn player(&self, owner_id: Uuid) -> Option<&PlayerBattleStats> {
        self.players.iter().find(|p| p.owner_id == owner_id)
    }
}

/// PvP errors.
#[derive(Debug, Error)]
pub enum PvpError {
    /// Both builds belong to the same player.
    #[error("both builds belong to {0}")]
    SameOwner(Uuid),
    /// The battle could not be simulated.
    #[error(transparent)]
    Simulation(#[from] SimError),
}

/// Resolves challenges under one set of battle rules.
#[derive(Clone, Debug, Default)]
pub struct PvpResolver {
    config: BattleConfig,
}

impl PvpResolver {
    /// Create a resolver.
    pub fn new(config: BattleConfig) -> Self {
        Self { config }
    }

    /// Battle rules in force.
    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Resolve a challenge by full recomputation.
    #[instrument(skip_all, fields(challenge = %request.challenge_id))]
    pub fn resolve(&self, request: &PvpRequest) -> Result<PvpResolution, PvpError> {
        let [a, b] = &request.builds;
        if a.owner_id == b.owner_id {
            return Err(PvpError::SameOwner(a.owner_id));
        }
        let (home, away) = if a.owner_id < b.owner_id { (a, b) } else { (b, a) };

        let report = simulate_battle(request.seed, home, away, &self.config)?;
        let owners = [home.owner_id, away.owner_id];
        let resolution = self.resolution(request.challenge_id, owners, &report);

        if let Some(claimed) = &request.claimed {
            let agrees = claimed.winner_id == resolution.winner_id
                && claimed.win_reason == resolution.win_reason
                && claimed.duration_ticks == resolution.duration_ticks;
            if !agrees {
                warn!(
                    claimed_winner = ?claimed.winner_id,
                    winner = ?resolution.winner_id,
                    claimed_ticks = claimed.duration_ticks,
                    ticks = resolution.duration_ticks,
                    "client result disagrees with recomputation"
                );
            }
        }

        info!(
            winner = ?resolution.winner_id,
            reason = ?resolution.win_reason,
            ticks = resolution.duration_ticks,
            final_hash = %hex::encode(resolution.final_hash.to_le_bytes()),
            "challenge resolved"
        );
        Ok(resolution)
    }

    fn resolution(&self, challenge_id: Uuid, owners: [Uuid; 2], report: &BattleReport) -> PvpResolution {
        let trophies = |side: Side| match report.winner {
            None => self.config.trophies_draw,
            Some(winner) if winner == side => self.config.trophies_win,
            Some(_) => self.config.trophies_loss,
        };
        let player = |side: Side| {
            let s = &report.sides[side.index()];
            PlayerBattleStats {
                owner_id: owners[side.index()],
                side,
                objective_health: s.objective_health,
                units_alive: s.units_alive,
                kills: s.kills,
                losses: s.losses,
                damage_dealt: s.damage_dealt,
                trophies: trophies(side),
            }
        };

        PvpResolution {
            challenge_id,
            winner_id: report.winner.map(|side| owners[side.index()]),
            win_reason: report.reason,
            duration_ticks: report.end_tick,
            final_hash: report.final_hash,
            resolved_at: Utc::now(),
            players: [player(Side::Home), player(Side::Away)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::{Loadout, ProgressionBonuses};

    fn build(owner: u128, loadout: Loadout) -> BattleBuildConfig {
        BattleBuildConfig {
            owner_id: Uuid::from_u128(owner),
            loadout,
            bonuses: ProgressionBonuses::default(),
        }
    }

    fn short() -> PvpResolver {
        PvpResolver::new(BattleConfig { duration_secs: 2, ..BattleConfig::default() })
    }

    #[test]
    fn test_lower_owner_plays_home() {
        let strong = build(9, Loadout::starter());
        let weak = build(3, Loadout::default());
        let request = PvpRequest {
            challenge_id: Uuid::from_u128(1),
            seed: 11,
            builds: [strong.clone(), weak.clone()],
            claimed: None,
        };

        let resolution = short().resolve(&request).unwrap();
        assert_eq!(resolution.players[0].owner_id, weak.owner_id);
        assert_eq!(resolution.players[0].side, Side::Home);
        assert_eq!(resolution.winner_id, Some(strong.owner_id));
        assert_eq!(resolution.player(strong.owner_id).map(|p| p.trophies), Some(30));
        assert_eq!(resolution.player(weak.owner_id).map(|p| p.trophies), Some(-15));
    }

    #[test]
    fn test_claim_never_changes_result() {
        let a = build(1, Loadout::starter());
        let b = build(2, Loadout::default());
        let mut request = PvpRequest {
            challenge_id: Uuid::from_u128(7),
            seed: 4,
            builds: [a, b.clone()],
            claimed: None,
        };
        let honest = short().resolve(&request).unwrap();

        request.claimed = Some(ClaimedResult {
            winner_id: Some(b.owner_id),
            win_reason: WinReason::ObjectiveDestroyed,
            duration_ticks: 1,
        });
        let lied = short().resolve(&request).unwrap();
        assert_eq!(lied.winner_id, honest.winner_id);
        assert_eq!(lied.players, honest.players);
    }

    #[test]
    fn test_same_owner_refused() {
        let request = PvpRequest {
            challenge_id: Uuid::from_u128(2),
            seed: 1,
            builds: [build(5, Loadout::default()), build(5, Loadout::starter())],
            claimed: None,
        };
        assert!(matches!(short().resolve(&request), Err(PvpError::SameOwner(_))));
    }

    #[test]
    fn test_draw_rewards() {
        let request = PvpRequest {
            challenge_id: Uuid::from_u128(3),
            seed: 1,
            builds: [build(1, Loadout::default()), build(2, Loadout::default())],
            claimed: None,
        };
        let resolution = short().resolve(&request).unwrap();
        assert_eq!(resolution.winner_id, None);
        assert!(resolution.players.iter().all(|p| p.trophies == 5));
    }
}
