//! The order builds arrive in never changes a battle.

use bastion::game::config::{Loadout, ProgressionBonuses};
use bastion::game::Side;
use bastion::pvp::{BattleBuildConfig, BattleConfig, PvpRequest, PvpResolver};
use uuid::Uuid;

fn build(owner: u128, loadout: Loadout) -> BattleBuildConfig {
    BattleBuildConfig {
        owner_id: Uuid::from_u128(owner),
        loadout,
        bonuses: ProgressionBonuses::default(),
    }
}

fn towers_only() -> Loadout {
    let mut loadout = Loadout::starter();
    loadout.units.clear();
    loadout
}

fn request(builds: [BattleBuildConfig; 2]) -> PvpRequest {
    PvpRequest { challenge_id: Uuid::from_u128(0xC0FFEE), seed: 77, builds, claimed: None }
}

#[test]
fn swapping_builds_gives_the_same_resolution() {
    let resolver = PvpResolver::new(BattleConfig { duration_secs: 20, ..BattleConfig::default() });
    let a = build(0x20, Loadout::starter());
    let b = build(0x10, towers_only());

    let forward = resolver.resolve(&request([a.clone(), b.clone()])).unwrap();
    let backward = resolver.resolve(&request([b.clone(), a.clone()])).unwrap();

    assert_eq!(forward.winner_id, backward.winner_id);
    assert_eq!(forward.win_reason, backward.win_reason);
    assert_eq!(forward.duration_ticks, backward.duration_ticks);
    assert_eq!(forward.final_hash, backward.final_hash);
    assert_eq!(forward.players, backward.players);

    // lower id plays Home regardless of order
    assert_eq!(forward.players[0].owner_id, b.owner_id);
    assert_eq!(forward.players[0].side, Side::Home);
}

#[test]
fn resolution_is_repeatable() {
    let resolver = PvpResolver::default();
    let builds = [build(3, Loadout::starter()), build(4, towers_only())];
    let first = resolver.resolve(&request(builds.clone())).unwrap();
    let second = resolver.resolve(&request(builds)).unwrap();
    assert_eq!(first.final_hash, second.final_hash);
    assert_eq!(first.players, second.players);
}
