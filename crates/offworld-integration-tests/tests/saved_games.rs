//! Saved-game fidelity: snapshots taken mid-mission (transporter airborne,
//! limbo occupied) restore bit-identically and replay deterministically.

use offworld_core::droid::FlightAction;
use offworld_core::engine::Engine;
use offworld_core::id::Player;
use offworld_core::mission::{MissionType, ReinforcementTime};
use offworld_core::test_utils::*;
use offworld_core::validation::{quick_compare, validate_determinism};

/// Build an off-world mission with a loaded transporter waiting to fly in.
fn offworld_with_pending_reinforcements() -> Engine {
    let mut engine = engine_on_campaign_start();
    let transporter = spawn_transporter(&mut engine, Player(0));
    let _squad = load_squad(&mut engine, transporter, 3);
    engine.end_mission();

    engine
        .start_mission(MissionType::OffworldKeep, Some(&offworld_level()))
        .unwrap();
    engine.landing_zones.set(0, 10, 10, 12, 12);
    engine.set_transporter_entry(Player(0), 1, 1);
    engine.set_transporter_exit(Player(0), 1, 1);
    engine.set_reinforcement_eta(ReinforcementTime::At(1200));
    engine.launch_transporter(transporter).unwrap();
    engine
}

#[test]
fn save_restores_pending_flight() {
    let mut engine = offworld_with_pending_reinforcements();
    run_ticks(&mut engine, 50);

    let bytes = engine.save_snapshot().unwrap();
    let restored = Engine::load_snapshot(&bytes).unwrap();

    assert!(quick_compare(&engine, &restored).is_identical());
    let transporter = restored.first_transporter(Player(0)).unwrap();
    assert_eq!(restored.droids[transporter].flight, FlightAction::WaitToFlyIn);
    assert_eq!(restored.passengers(transporter).len(), 3);
    assert!(restored.is_mission_offworld());
    assert!(restored.mission.stash_in_use);
}

#[test]
fn saved_game_replays_deterministically() {
    let mut engine = offworld_with_pending_reinforcements();
    run_ticks(&mut engine, 10);

    let bytes = engine.save_snapshot().unwrap();
    // Far enough to cover the wait, the fly-in, the landing, and the
    // return leg.
    let result = validate_determinism(&bytes, 1500).unwrap();
    assert!(
        result.is_deterministic,
        "replicas diverged at tick {:?}",
        result.divergence_tick
    );
}

#[test]
fn restored_replica_tracks_the_original() {
    let mut engine = offworld_with_pending_reinforcements();
    run_ticks(&mut engine, 5);

    let bytes = engine.save_snapshot().unwrap();
    let mut replica = Engine::load_snapshot(&bytes).unwrap();

    // Step both through the entire reinforcement cycle.
    for _ in 0..1400 {
        engine.step();
        replica.step();
        assert_eq!(engine.last_state_hash(), replica.last_state_hash());
    }
    assert!(quick_compare(&engine, &replica).is_identical());
}

mod level_loading {
    use super::*;
    use offworld_core::level::load_level_from_json;

    #[test]
    fn level_json_round_trip_starts_a_mission() {
        let level = offworld_level();
        let json = serde_json::to_string(&level).unwrap();
        let parsed = load_level_from_json(&json).unwrap();

        let mut engine = engine_on_campaign_start();
        engine.end_mission();
        engine
            .start_mission(MissionType::OffworldClear, Some(&parsed))
            .unwrap();
        assert!(engine.is_mission_offworld());
        assert_eq!(engine.world.map.width(), level.width);
    }
}
