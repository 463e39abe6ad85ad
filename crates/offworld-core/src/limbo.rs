//! Limbo migration: droids that survive mission boundaries in neither world.
//!
//! A limbo droid sits in `MissionContext::limbo` with no position, no base,
//! and no orders, until it is materialized back onto a live map near the
//! limbo landing zone. Transporters never enter limbo: a transporter met
//! during migration is destroyed, and its passengers stay reachable through
//! the live list.

use crate::droid::Order;
use crate::engine::Engine;
use crate::id::Player;
use crate::landing::LIMBO_LANDING;
use crate::map::{MovementClass, TilePos, world_coord};

/// Upper bound on limbo residents per player; overflow is destroyed.
pub const MAX_LIMBO_DROIDS: usize = 999;

impl Engine {
    /// Move every droid off a player's live list into limbo.
    ///
    /// Transporters are destroyed rather than limboed; their passengers are
    /// released into the live list first (a carrier must never disappear
    /// with droids aboard). Factories and labs go on hold so nothing
    /// progresses while the player is away.
    pub fn migrate_to_limbo(&mut self, player: Player) {
        log::debug!("migrating player {} droids to limbo", player.0);
        let ids = self.world.droids[player].clone();
        for id in ids {
            let Some(d) = self.droids.get(id) else {
                continue;
            };
            if d.is_transporter() {
                // A carrier never crosses a limbo boundary with droids
                // aboard: passengers are released into the live list first,
                // then the carrier dies.
                for p in self.passengers(id) {
                    log::error!("releasing passenger {p:?} before limbo migration");
                    if let Some(gid) = self.cargo_group(id) {
                        self.groups[gid].remove(p);
                    }
                    if let Some(pd) = self.droids.get_mut(p) {
                        pd.group = None;
                        pd.clear_map_state();
                        let owner = pd.player;
                        self.world.add_droid(owner, p);
                    }
                }
                self.vanish_droid(id);
                continue;
            }
            if self.mission.limbo[player].len() >= MAX_LIMBO_DROIDS {
                self.vanish_droid(id);
                continue;
            }
            if self.world.remove_droid(player, id) {
                let d = &mut self.droids[id];
                d.clear_map_state();
                d.order = Order::Stop;
                self.mission.limbo[player].push(id);
            }
        }

        // Anything producing for the absent player pauses.
        for sid in self.world.structures[player].clone() {
            if let Some(s) = self.structures.get_mut(sid) {
                s.hold_work();
            }
        }
    }

    /// Bring the selected player's limbo droids back onto the live map,
    /// each on a free tile near the limbo landing zone. A droid that cannot
    /// be placed is destroyed (logged), never left half-owned.
    pub fn materialize_limbo_droids(&mut self) {
        let player = self.selected_player;
        let ids = std::mem::take(&mut self.mission.limbo[player]);
        if ids.is_empty() {
            return;
        }
        log::debug!("materializing {} limbo droids", ids.len());
        let (lx, ly) = self.landing_zones.landing_position(LIMBO_LANDING);
        let start = TilePos::new(crate::map::map_coord(lx), crate::map::map_coord(ly));

        for id in ids {
            let Some(d) = self.droids.get(id) else {
                continue;
            };
            if d.is_transporter() {
                // Should never be one, but never let it through.
                debug_assert!(false, "transporter found in the limbo list");
                log::error!("destroying transporter {id:?} found in limbo");
                self.world.add_droid(player, id);
                self.vanish_droid(id);
                continue;
            }
            self.world.add_droid(player, id);
            match self.pick_free_tile_for(start, MovementClass::Ground, false) {
                Some(t) => {
                    self.set_droid_position(id, world_coord(t.x), world_coord(t.y));
                    let d = &mut self.droids[id];
                    d.order = Order::Stop;
                    d.base = None;
                    d.selected = false;
                }
                None => {
                    log::error!("no free tile near the limbo landing zone for {id:?}, removing");
                    self.vanish_droid(id);
                }
            }
        }
    }

    /// Number of droids a player has in limbo.
    pub fn limbo_count(&self, player: Player) -> usize {
        self.mission.limbo[player].len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::droid::{Droid, DroidKind};
    use crate::engine::{Engine, GameMode};
    use crate::level::{LevelData, ObjectPolicy};

    fn engine_with_map() -> Engine {
        let mut engine = Engine::new(GameMode::Campaign);
        let level = LevelData::flat("test", 32, 32);
        engine.apply_level(&level, ObjectPolicy::ClearObjects);
        engine.landing_zones.set(LIMBO_LANDING, 10, 10, 14, 14);
        engine
    }

    #[test]
    fn migrate_moves_droids_with_invalid_position() {
        let mut engine = engine_with_map();
        let a = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "A"));
        let b = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "B"));
        engine.set_droid_position(a, world_coord(3), world_coord(3));
        engine.set_droid_position(b, world_coord(4), world_coord(4));

        engine.migrate_to_limbo(Player(0));

        assert!(engine.world.droids[Player(0)].is_empty());
        assert_eq!(engine.limbo_count(Player(0)), 2);
        assert_eq!(engine.droids[a].pos, None);
        assert_eq!(engine.droids[b].pos, None);
    }

    #[test]
    fn migrate_holds_factories_and_labs() {
        let mut engine = engine_with_map();
        use crate::map::WorldPos;
        use crate::structure::{Structure, StructureKind};
        let sid = engine.structures.insert(Structure::new(
            Player(0),
            StructureKind::Factory {
                assembly_point: None,
                on_hold: false,
            },
            "Factory",
            WorldPos::new(640, 640, 0),
        ));
        engine.world.structures[Player(0)].push(sid);

        engine.migrate_to_limbo(Player(0));
        assert!(matches!(
            engine.structures[sid].kind,
            StructureKind::Factory { on_hold: true, .. }
        ));
    }

    #[test]
    fn materialize_places_droids_on_distinct_free_tiles() {
        let mut engine = engine_with_map();
        let a = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "A"));
        let b = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "B"));
        engine.migrate_to_limbo(Player(0));

        engine.materialize_limbo_droids();

        assert_eq!(engine.limbo_count(Player(0)), 0);
        assert_eq!(engine.world.droids[Player(0)].len(), 2);
        let pa = engine.droids[a].pos.expect("A placed");
        let pb = engine.droids[b].pos.expect("B placed");
        assert_ne!(pa.tile(), pb.tile(), "droids get distinct tiles");
        assert!(engine.world.map.world_on_map(pa));
        assert!(engine.world.map.world_on_map(pb));
    }

    #[test]
    fn limbo_overflow_vanishes_excess() {
        let mut engine = engine_with_map();
        for i in 0..3 {
            engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, format!("D{i}")));
        }
        // Artificially shrink the headroom by pre-filling limbo to the cap.
        let filler = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "filler"));
        engine.world.remove_droid(Player(0), filler);
        engine.mission.limbo[Player(0)] = vec![filler; MAX_LIMBO_DROIDS];

        engine.migrate_to_limbo(Player(0));
        assert!(engine.world.droids[Player(0)].is_empty());
        assert_eq!(engine.limbo_count(Player(0)), MAX_LIMBO_DROIDS);
    }
}
