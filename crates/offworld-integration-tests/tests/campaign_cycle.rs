//! Full campaign narratives: home base, off-world sortie, campaign change
//! with carry-forward, and the next campaign consuming the carried force.

use offworld_core::droid::FlightAction;
use offworld_core::id::Player;
use offworld_core::mission::MissionType;
use offworld_core::test_utils::*;
use offworld_core::transporter::TRANSPORTER_CAPACITY;
use offworld_core::validation::audit;

// ===========================================================================
// Campaign change with move-to-safety
// ===========================================================================
//
// The transporter is emptied into the holding list, the list is reversed,
// and the first transporter found is re-filled to capacity — so the next
// campaign opens with a loaded transporter ready to fly in.

#[test]
fn carry_forward_refills_first_transporter() {
    let mut engine = engine_on_campaign_start();
    let transporter = spawn_transporter(&mut engine, Player(0));
    let aboard = load_squad(&mut engine, transporter, 4);
    let on_foot: Vec<_> = (0..8)
        .map(|i| spawn_soldier(&mut engine, Player(0), &format!("Foot {i}")))
        .collect();
    engine.set_droids_to_safety(true);
    engine.end_mission();

    let mut next_home = home_level();
    next_home.name = "beta-base".into();
    engine
        .start_mission(MissionType::CampaignChange, Some(&next_home))
        .unwrap();

    // Only what was aboard a transporter survives a move-to-safety change;
    // units left standing on the old map are gone.
    for &d in &aboard {
        assert!(engine.droids.get(d).is_some(), "droid {d:?} carried forward");
        assert_eq!(engine.droids[d].pos, None, "carried droids are unplaced");
    }
    for &d in &on_foot {
        assert!(engine.droids.get(d).is_none(), "droid {d:?} left behind");
    }
    assert!(engine.mission.stash.contains_droid(transporter));

    let cargo = engine.passengers(transporter);
    assert_eq!(
        cargo.len() as u32,
        TRANSPORTER_CAPACITY.min(aboard.len() as u32),
        "first transporter re-filled from the holding list"
    );
    assert!(audit(&engine).is_empty());
}

#[test]
fn carry_forward_without_safety_moves_list_wholesale() {
    let mut engine = engine_on_campaign_start();
    let squad: Vec<_> = (0..5)
        .map(|i| spawn_soldier(&mut engine, Player(0), &format!("S{i}")))
        .collect();
    for (i, &d) in squad.iter().enumerate() {
        engine.set_droid_position(d, 640 + 128 * i as u32, 640);
    }
    engine.set_droids_to_safety(false);
    engine.end_mission();

    let mut next_home = home_level();
    next_home.name = "beta-base".into();
    engine
        .start_mission(MissionType::CampaignChange, Some(&next_home))
        .unwrap();

    for &d in &squad {
        assert!(engine.mission.stash.contains_droid(d));
        assert_eq!(engine.droids[d].pos, None, "position marked invalid");
    }
    assert!(engine.world.droids[Player(0)].is_empty());
    assert!(audit(&engine).is_empty());
}

// ===========================================================================
// The next campaign consumes the carried force
// ===========================================================================

#[test]
fn carried_transporter_flies_into_next_campaign() {
    let mut engine = engine_on_campaign_start();
    let transporter = spawn_transporter(&mut engine, Player(0));
    let squad = load_squad(&mut engine, transporter, 3);
    engine.set_droids_to_safety(true);
    engine.end_mission();

    let mut next_home = home_level();
    next_home.name = "beta-base".into();
    engine
        .start_mission(MissionType::CampaignChange, Some(&next_home))
        .unwrap();
    set_default_zones(&mut engine);

    engine.fly_transporters_in(Player(0), false);
    assert!(engine.world.contains_droid(transporter), "flying on the live map");
    assert_eq!(engine.droids[transporter].flight, FlightAction::TransportIn);

    // Let it land and unload.
    run_ticks(&mut engine, 300);
    for &d in &squad {
        assert!(engine.world.contains_droid(d), "squad delivered");
        assert!(engine.droids[d].pos.is_some());
    }
    assert!(audit(&engine).is_empty());
}

// ===========================================================================
// Leftover carry-forward droids are destroyed at the campaign's end
// ===========================================================================

#[test]
fn unclaimed_carry_forward_is_destroyed_at_mission_end() {
    let mut engine = engine_on_campaign_start();
    let straggler = spawn_soldier(&mut engine, Player(0), "Straggler");
    engine.set_droids_to_safety(false);
    engine.end_mission();

    let mut next_home = home_level();
    next_home.name = "beta-base".into();
    engine
        .start_mission(MissionType::CampaignChange, Some(&next_home))
        .unwrap();
    assert!(engine.mission.stash.contains_droid(straggler));

    // Nobody flew the straggler in; ending the campaign cleans it up.
    engine.end_mission();
    assert!(engine.droids.get(straggler).is_none());
    assert!(audit(&engine).is_empty());
}
