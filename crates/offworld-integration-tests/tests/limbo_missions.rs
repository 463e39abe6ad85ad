//! Limbo mission cycles: survivors banked off-world, brought back on a
//! later expand, and the mid-mission reset path.

use offworld_core::id::Player;
use offworld_core::landing::LIMBO_LANDING;
use offworld_core::mission::MissionType;
use offworld_core::test_utils::*;
use offworld_core::validation::audit;

// ===========================================================================
// OffworldKeepLimbo: survivors enter limbo on return
// ===========================================================================

#[test]
fn offworld_keep_limbo_banks_survivors() {
    let mut engine = engine_on_campaign_start();
    engine.end_mission();

    engine
        .start_mission(MissionType::OffworldKeepLimbo, Some(&offworld_level()))
        .unwrap();

    // The strike team fights on the mission map.
    let team: Vec<_> = (0..3)
        .map(|i| spawn_soldier(&mut engine, Player(0), &format!("Striker {i}")))
        .collect();
    for (i, &d) in team.iter().enumerate() {
        engine.set_droid_position(d, 1280 + 128 * i as u32, 1280);
    }

    engine.end_mission();

    assert_eq!(engine.mission.mission_type, MissionType::None);
    assert_eq!(engine.world.map.width(), 32, "home map restored");
    assert_eq!(engine.limbo_count(Player(0)), 3, "survivors banked");
    for &d in &team {
        assert_eq!(engine.droids[d].pos, None);
        assert!(!engine.world.contains_droid(d));
    }
    assert!(audit(&engine).is_empty());

    // A later expand brings them out near the limbo LZ.
    let mut expanded = home_level();
    expanded.name = "expanded-home".into();
    engine
        .start_mission(MissionType::Expand, Some(&expanded))
        .unwrap();
    engine.landing_zones.set(LIMBO_LANDING, 20, 20, 24, 24);
    engine.materialize_limbo_droids();

    assert_eq!(engine.limbo_count(Player(0)), 0);
    for &d in &team {
        assert!(engine.world.contains_droid(d));
        let pos = engine.droids[d].pos.expect("placed near the limbo LZ");
        let tile = pos.tile();
        assert!(
            (18..=26).contains(&tile.x) && (18..=26).contains(&tile.y),
            "placed near the limbo zone, got {tile:?}"
        );
    }
    assert!(audit(&engine).is_empty());
}

// ===========================================================================
// ExpandLimbo: the mid-mission reset path
// ===========================================================================

#[test]
fn reset_limbo_mission_downgrades_to_expand() {
    let mut engine = engine_on_campaign_start();
    let a = spawn_soldier(&mut engine, Player(0), "Alpha");
    engine.set_droid_position(a, 640, 640);
    engine.end_mission();

    let mut expand = home_level();
    expand.name = "expanded".into();
    engine
        .start_mission(MissionType::ExpandLimbo, Some(&expand))
        .unwrap();
    assert!(engine.is_limbo_expand());
    assert_eq!(engine.limbo_count(Player(0)), 1);

    engine.reset_limbo_mission();

    assert_eq!(engine.mission.mission_type, MissionType::Expand);
    assert!(!engine.is_limbo_expand());
    assert_eq!(engine.limbo_count(Player(0)), 0);
    assert!(engine.world.contains_droid(a));
    assert!(engine.droids[a].pos.is_some());
    assert!(audit(&engine).is_empty());
}

// ===========================================================================
// ExpandLimbo end handler drains whatever limbo still holds
// ===========================================================================

#[test]
fn expand_limbo_end_materializes_stragglers() {
    let mut engine = engine_on_campaign_start();
    let a = spawn_soldier(&mut engine, Player(0), "Alpha");
    let b = spawn_soldier(&mut engine, Player(0), "Bravo");
    engine.set_droid_position(a, 640, 640);
    engine.set_droid_position(b, 768, 640);
    engine.end_mission();

    let mut expand = home_level();
    expand.name = "expanded".into();
    engine
        .start_mission(MissionType::ExpandLimbo, Some(&expand))
        .unwrap();
    assert_eq!(engine.limbo_count(Player(0)), 2);

    // The scripts never placed them; ending the mission must not lose them.
    engine.end_mission();
    assert_eq!(engine.limbo_count(Player(0)), 0);
    assert!(engine.world.contains_droid(a));
    assert!(engine.world.contains_droid(b));
    assert!(engine.droids[a].pos.is_some());
    assert!(engine.droids[b].pos.is_some());
    assert!(audit(&engine).is_empty());
}

// ===========================================================================
// Production holds across a limbo boundary
// ===========================================================================

#[test]
fn limbo_migration_holds_factories() {
    use offworld_core::structure::StructureKind;

    let mut engine = engine_on_campaign_start();
    engine.end_mission();

    // A bare terrain expansion: the kept home structures are the only ones.
    let expand = offworld_core::level::LevelData::flat("expanded", 40, 40);
    engine
        .start_mission(MissionType::ExpandLimbo, Some(&expand))
        .unwrap();

    let held: Vec<_> = engine.world.structures[Player(0)]
        .iter()
        .filter_map(|&sid| engine.structures.get(sid))
        .filter_map(|s| match &s.kind {
            StructureKind::Factory { on_hold, .. } => Some(*on_hold),
            StructureKind::Research { on_hold } => Some(*on_hold),
            _ => None,
        })
        .collect();
    assert!(!held.is_empty(), "the home base has production structures");
    assert!(held.iter().all(|&h| h), "all production is on hold");
}
