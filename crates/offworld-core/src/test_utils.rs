//! Shared test helpers for unit, integration, and property tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! builders serve in-crate unit tests and the cross-crate scenario suite
//! (via the `test-utils` feature).

use crate::droid::{Droid, DroidKind};
use crate::engine::{Engine, GameMode};
use crate::id::{DroidId, Player};
use crate::landing::LIMBO_LANDING;
use crate::level::{DroidDef, LevelData, ObjectPolicy, StructureDef};
use crate::map::TilePos;
use crate::mission::MissionType;
use crate::structure::StructureKind;

// ===========================================================================
// Levels
// ===========================================================================

/// A 32x32 home-base level: HQ, a factory, and a repair facility.
pub fn home_level() -> LevelData {
    let mut level = LevelData::flat("home-base", 32, 32);
    level.structures.push(StructureDef {
        player: 0,
        kind: StructureKind::Hq,
        name: "Command Center".into(),
        tile: TilePos::new(8, 8),
    });
    level.structures.push(StructureDef {
        player: 0,
        kind: StructureKind::Factory {
            assembly_point: Some(TilePos::new(12, 10)),
            on_hold: false,
        },
        name: "Factory".into(),
        tile: TilePos::new(10, 8),
    });
    level.structures.push(StructureDef {
        player: 0,
        kind: StructureKind::RepairFacility,
        name: "Repair Facility".into(),
        tile: TilePos::new(6, 8),
    });
    level
}

/// A 24x24 off-world mission level with a few enemy units.
pub fn offworld_level() -> LevelData {
    let mut level = LevelData::flat("offworld-site", 24, 24);
    for i in 0..3 {
        level.droids.push(DroidDef {
            player: 1,
            kind: DroidKind::Weapon,
            body_size: crate::droid::BodySize::Light,
            name: format!("Raider {i}"),
            tile: TilePos::new(18 + i, 18),
        });
    }
    level
}

// ===========================================================================
// Engines
// ===========================================================================

/// A campaign engine with the home level applied directly (no mission).
pub fn engine_with_home() -> Engine {
    let mut engine = Engine::new(GameMode::Campaign);
    engine.apply_level(&home_level(), ObjectPolicy::ClearObjects);
    set_default_zones(&mut engine);
    engine
}

/// A campaign engine mid-`CampaignStart` on the home level.
pub fn engine_on_campaign_start() -> Engine {
    let mut engine = Engine::new(GameMode::Campaign);
    engine
        .start_mission(MissionType::CampaignStart, Some(&home_level()))
        .expect("home level starts");
    set_default_zones(&mut engine);
    engine
}

/// Place the player-0 LZ, the limbo LZ, and sensible entry/exit points.
pub fn set_default_zones(engine: &mut Engine) {
    engine.landing_zones.set(0, 2, 2, 4, 4);
    engine.landing_zones.set(LIMBO_LANDING, 20, 20, 24, 24);
    engine.set_transporter_entry(Player(0), 1, 1);
    engine.set_transporter_exit(Player(0), 1, 1);
}

// ===========================================================================
// Units
// ===========================================================================

pub fn spawn_soldier(engine: &mut Engine, player: Player, name: &str) -> DroidId {
    engine.create_droid(Droid::new(player, DroidKind::Weapon, name))
}

pub fn spawn_transporter(engine: &mut Engine, player: Player) -> DroidId {
    engine.create_droid(Droid::new(player, DroidKind::Transporter, "Transport"))
}

/// Board `n` freshly spawned soldiers onto a transporter.
pub fn load_squad(engine: &mut Engine, transporter: DroidId, n: usize) -> Vec<DroidId> {
    let player = engine.droids[transporter].player;
    (0..n)
        .map(|i| {
            let d = spawn_soldier(engine, player, &format!("Squad {i}"));
            engine
                .load_droid(transporter, d)
                .expect("squad member fits");
            d
        })
        .collect()
}

/// Step the engine `n` times.
pub fn run_ticks(engine: &mut Engine, n: u64) {
    for _ in 0..n {
        engine.step();
    }
}
