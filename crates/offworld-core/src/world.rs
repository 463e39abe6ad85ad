//! The world-state pair and its swap engine.
//!
//! Exactly one [`WorldState`] is live at a time: the engine's `world` field.
//! The other sits inside the mission context as the stash. Three operations
//! move state between them, and all three are single conceptual steps (a
//! whole-value move or swap; no partial exchange is ever observable):
//!
//! - [`Engine::swap_world_states`] exchanges live and stashed wholesale,
//!   used to place droids relative to the *other* map's geometry.
//! - [`Engine::capture_world_into_stash`] moves the live world into the
//!   stash, leaving the live view cleared for a level load.
//! - [`Engine::restore_world_from_stash`] destroys whatever the live view
//!   still owns and moves the stash back in.
//!
//! This module also owns the droid ownership-transfer helpers. A droid is
//! owned by exactly one of: a live world list, a stashed world list, a limbo
//! list, or a transporter's cargo group. Every transfer below removes from
//! one owner and inserts into exactly one other (or destroys), so the
//! exactly-one-owner property holds by construction.

use crate::droid::{Droid, DroidKind};
use crate::group::{Group, GroupKind};
use crate::id::{DroidId, FeatureId, GroupId, PerPlayer, Player, StructureId};
use crate::map::{Gateway, MovementClass, ScrollBounds, TileMap, TilePos, WorldPos};
use crate::structure::FlagPosition;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// One complete world: per-player entity lists, auxiliary indices, terrain,
/// scroll bounds, and gateways. `Default` is the cleared state left behind
/// by a capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub droids: PerPlayer<Vec<DroidId>>,
    pub structures: PerPlayer<Vec<StructureId>>,
    pub features: PerPlayer<Vec<FeatureId>>,
    pub flags: PerPlayer<Vec<FlagPosition>>,
    pub extractors: PerPlayer<Vec<StructureId>>,
    /// Global sensor index (shared, not per-player).
    pub sensors: Vec<StructureId>,
    /// Global oil-resource index.
    pub oil: Vec<FeatureId>,
    pub map: TileMap,
    pub scroll: ScrollBounds,
    pub gateways: Vec<Gateway>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every list is empty and no terrain is held.
    pub fn is_cleared(&self) -> bool {
        self.map.is_empty()
            && self.gateways.is_empty()
            && self.sensors.is_empty()
            && self.oil.is_empty()
            && self.droids.iter().all(|(_, l)| l.is_empty())
            && self.structures.iter().all(|(_, l)| l.is_empty())
            && self.features.iter().all(|(_, l)| l.is_empty())
            && self.flags.iter().all(|(_, l)| l.is_empty())
            && self.extractors.iter().all(|(_, l)| l.is_empty())
    }

    /// Whether any per-player droid list contains the id.
    pub fn contains_droid(&self, id: DroidId) -> bool {
        self.droids.iter().any(|(_, l)| l.contains(&id))
    }

    /// Remove a droid id from its player's list. Returns whether it was
    /// present.
    pub fn remove_droid(&mut self, player: Player, id: DroidId) -> bool {
        let list = &mut self.droids[player];
        match list.iter().position(|&d| d == id) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        }
    }

    /// Append a droid id to its player's list.
    pub fn add_droid(&mut self, player: Player, id: DroidId) {
        debug_assert!(
            !self.droids[player].contains(&id),
            "droid already in list for player {}",
            player.0
        );
        self.droids[player].push(id);
    }

    /// All droid ids across every player, in player-then-list order.
    pub fn all_droids(&self) -> Vec<DroidId> {
        let mut out = Vec::new();
        for (_, list) in self.droids.iter() {
            out.extend_from_slice(list);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Swap engine
// ---------------------------------------------------------------------------

use crate::engine::Engine;

impl Engine {
    /// Exchange the live and stashed world states wholesale.
    ///
    /// Both directions of a round trip use this: swap, place or measure
    /// against the other map, swap back. Every field (lists, terrain,
    /// bounds, gateways) moves together.
    pub fn swap_world_states(&mut self) {
        log::debug!("swapping world states");
        std::mem::swap(&mut self.world, &mut self.mission.stash);
    }

    /// Move the live world into the stash, leaving the live view cleared
    /// and ready for a level load.
    ///
    /// Capturing while the stash already holds a world is a logic error:
    /// refused without mutation.
    pub fn capture_world_into_stash(&mut self) -> bool {
        debug_assert!(
            !self.mission.stash_in_use,
            "capture with a world already stashed"
        );
        if self.mission.stash_in_use {
            log::error!("capture refused: a world is already stashed");
            return false;
        }
        if !self.mission.stash.is_cleared() {
            // Stale holding-list droids from a previous campaign must be
            // dealt with before a capture can take the slot.
            log::error!("capture refused: stash holding lists are not empty");
            return false;
        }
        self.mission.stash = std::mem::take(&mut self.world);
        self.mission.stash_in_use = true;
        true
    }

    /// Destroy everything the live world still owns, then move the stashed
    /// world back in. The inverse of [`Engine::capture_world_into_stash`];
    /// refused (without mutation) when no world is stashed.
    pub fn restore_world_from_stash(&mut self) -> bool {
        debug_assert!(self.mission.stash_in_use, "restore with no stashed world");
        if !self.mission.stash_in_use {
            log::error!("restore refused: no world is stashed");
            return false;
        }
        self.clear_live_world();
        self.world = std::mem::take(&mut self.mission.stash);
        self.mission.stash_in_use = false;
        self.mission.off_world_keep_lists = false;
        true
    }

    /// Remove every entity owned by the live world from the arenas and
    /// clear the lists. Used before a restore and by clearing level loads.
    pub(crate) fn clear_live_world(&mut self) {
        // Vanishing a loaded transporter rescues its passengers into the
        // live list, so drain until genuinely empty rather than iterating
        // a snapshot.
        loop {
            let next = self
                .world
                .droids
                .iter()
                .find_map(|(_, l)| l.first().copied());
            match next {
                Some(id) => self.remove_droid_everywhere(id, false),
                None => break,
            }
        }
        for player in Player::all() {
            for id in std::mem::take(&mut self.world.structures[player]) {
                self.structures.remove(id);
            }
            for id in std::mem::take(&mut self.world.features[player]) {
                self.features.remove(id);
            }
            self.world.flags[player].clear();
            self.world.extractors[player].clear();
        }
        self.world.sensors.clear();
        self.world.oil.clear();
        self.world.map = TileMap::default();
        self.world.scroll = ScrollBounds::default();
        self.world.gateways.clear();
    }
}

// ---------------------------------------------------------------------------
// Droid lifecycle and ownership transfers
// ---------------------------------------------------------------------------

impl Engine {
    /// Insert a droid into the arena and the live list of its player.
    /// Transporters get a cargo group; commanders get a command group with
    /// themselves as first member.
    pub fn create_droid(&mut self, droid: Droid) -> DroidId {
        let player = droid.player;
        let kind = droid.kind;
        let id = self.droids.insert(droid);
        self.world.add_droid(player, id);
        match kind {
            k if k.is_transporter() => {
                let gid = self.groups.insert(Group::new(GroupKind::Cargo { transporter: id }));
                self.droids[id].group = Some(gid);
            }
            DroidKind::Commander => {
                let gid = self.groups.insert(Group::new(GroupKind::Command { leader: id }));
                self.groups[gid].add(id);
                self.droids[id].group = Some(gid);
            }
            _ => {}
        }
        id
    }

    /// The cargo group of a transporter, if the droid is one.
    pub fn cargo_group(&self, transporter: DroidId) -> Option<GroupId> {
        let droid = self.droids.get(transporter)?;
        let gid = droid.group?;
        match self.groups.get(gid)?.kind {
            GroupKind::Cargo { transporter: t } if t == transporter => Some(gid),
            _ => None,
        }
    }

    /// Passenger ids of a transporter, in boarding order. Empty when the
    /// droid is not a transporter.
    pub fn passengers(&self, transporter: DroidId) -> Vec<DroidId> {
        self.cargo_group(transporter)
            .map(|g| self.groups[g].members().to_vec())
            .unwrap_or_default()
    }

    /// Destroy a droid: the unit "vanishes" without explosion or wreck.
    pub fn vanish_droid(&mut self, id: DroidId) {
        self.remove_droid_everywhere(id, true);
    }

    /// Remove a droid from whichever collection owns it, dissolve its group
    /// relationships, and drop it from the arena.
    pub(crate) fn remove_droid_everywhere(&mut self, id: DroidId, announce: bool) {
        let Some(droid) = self.droids.get(id) else {
            log::warn!("vanish of unknown droid {id:?}");
            return;
        };
        let player = droid.player;
        let kind = droid.kind;
        let member_of = droid.group;

        let removed = self.world.remove_droid(player, id)
            || self.mission.stash.remove_droid(player, id)
            || remove_from_list(&mut self.mission.limbo[player], id)
            || member_of
                .and_then(|g| self.groups.get_mut(g))
                .map(|g| g.remove(id))
                .unwrap_or(false);
        debug_assert!(removed, "droid {id:?} was not owned by any collection");

        // Drop non-owning command-group membership too.
        if let Some(gid) = member_of {
            if let Some(group) = self.groups.get_mut(gid) {
                group.remove(id);
            }
        }

        match kind {
            k if k.is_transporter() => {
                // A dying carrier must not take its passengers with it.
                if let Some(gid) = self.cargo_group(id) {
                    let stranded = self.groups[gid].take_members();
                    for passenger in stranded {
                        log::error!("rescuing passenger {passenger:?} from destroyed transporter");
                        if let Some(p) = self.droids.get_mut(passenger) {
                            p.group = None;
                            p.clear_map_state();
                            let owner = p.player;
                            self.world.add_droid(owner, passenger);
                        }
                    }
                    self.groups.remove(gid);
                }
            }
            DroidKind::Commander => {
                // Dissolve the command group; members stay where they are.
                if let Some(gid) = member_of {
                    if let Some(group) = self.groups.get_mut(gid) {
                        if matches!(group.kind, GroupKind::Command { leader } if leader == id) {
                            for m in group.take_members() {
                                if let Some(d) = self.droids.get_mut(m) {
                                    d.group = None;
                                }
                            }
                            self.groups.remove(gid);
                        }
                    }
                }
            }
            _ => {}
        }

        let droid = self.droids.remove(id);
        if announce {
            if let Some(d) = droid {
                log::debug!("droid {:?} ({}) vanished", id, d.name);
                self.event_bus.publish(crate::event::Event::DroidVanished {
                    droid: id,
                    player,
                    tick: self.sim_state.tick,
                });
            }
        }
    }

    /// Move a droid from the live list to the stashed holding list.
    pub fn move_droid_to_stash_list(&mut self, id: DroidId) -> bool {
        let Some(player) = self.droids.get(id).map(|d| d.player) else {
            return false;
        };
        if self.world.remove_droid(player, id) {
            self.mission.stash.add_droid(player, id);
            true
        } else {
            false
        }
    }

    /// Move a droid from the stashed holding list to the live list.
    pub fn move_droid_to_live_list(&mut self, id: DroidId) -> bool {
        let Some(player) = self.droids.get(id).map(|d| d.player) else {
            return false;
        };
        if self.mission.stash.remove_droid(player, id) {
            self.world.add_droid(player, id);
            true
        } else {
            false
        }
    }

    /// Place a droid at a world position on the live map, taking terrain
    /// height from the tile under it.
    pub fn set_droid_position(&mut self, id: DroidId, x: u32, y: u32) {
        let z = self
            .world
            .map
            .tile_height(WorldPos::new(x, y, 0).tile()) as u32;
        if let Some(droid) = self.droids.get_mut(id) {
            droid.pos = Some(WorldPos::new(x, y, z));
        }
    }

    // -----------------------------------------------------------------------
    // Placement queries
    // -----------------------------------------------------------------------

    /// Whether any live droid stands on the tile.
    pub fn tile_occupied(&self, tile: TilePos) -> bool {
        self.world.droids.iter().any(|(_, list)| {
            list.iter().any(|&id| {
                self.droids
                    .get(id)
                    .and_then(|d| d.pos)
                    .is_some_and(|p| p.tile() == tile)
            })
        })
    }

    /// Find a free, reachable, non-edge tile near `start` on the live map.
    /// With `zoned`, tiles inside any landing zone are also rejected — the
    /// variant used for disembarkation and limbo placement.
    pub fn pick_free_tile_for(
        &self,
        start: TilePos,
        class: MovementClass,
        zoned: bool,
    ) -> Option<TilePos> {
        self.world.map.pick_free_tile(start, |t| {
            !self.world.map.near_edge(t)
                && !self.world.map.blocked(t, class)
                && !self.tile_occupied(t)
                && !(zoned && self.landing_zones.within_any(t))
        })
    }
}

fn remove_from_list(list: &mut Vec<DroidId>, id: DroidId) -> bool {
    match list.iter().position(|&d| d == id) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, GameMode};
    use crate::map::TileMap;

    fn engine_with_map(w: u32, h: u32) -> Engine {
        let mut engine = Engine::new(GameMode::Campaign);
        engine.world.map = TileMap::new(w, h);
        engine.world.scroll = ScrollBounds::new(0, 0, w - 1, h - 1);
        engine
    }

    #[test]
    fn swap_is_symmetric() {
        let mut engine = engine_with_map(16, 16);
        let id = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        let before_live = engine.world.clone();
        let before_stash = engine.mission.stash.clone();

        engine.swap_world_states();
        assert!(!engine.world.contains_droid(id));
        assert!(engine.mission.stash.contains_droid(id));

        engine.swap_world_states();
        assert_eq!(engine.world, before_live);
        assert_eq!(engine.mission.stash, before_stash);
    }

    #[test]
    fn capture_then_restore_round_trips() {
        let mut engine = engine_with_map(16, 16);
        engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        let before = engine.world.clone();

        assert!(engine.capture_world_into_stash());
        assert!(engine.world.is_cleared());
        assert!(engine.mission.stash_in_use);

        assert!(engine.restore_world_from_stash());
        assert_eq!(engine.world, before);
        assert!(engine.mission.stash.is_cleared());
        assert!(!engine.mission.stash_in_use);
    }

    #[test]
    fn double_capture_refused() {
        let mut engine = engine_with_map(8, 8);
        assert!(engine.capture_world_into_stash());
        let stash_before = engine.mission.stash.clone();
        // A second capture must not clobber the stash. Release builds refuse;
        // this test runs the release path logic via the explicit check.
        if !engine.mission.stash_in_use {
            panic!("stash should be in use");
        }
        assert!(!std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.capture_world_into_stash()
        }))
        .unwrap_or(false));
        assert_eq!(engine.mission.stash, stash_before);
    }

    #[test]
    fn restore_without_capture_refused() {
        let mut engine = engine_with_map(8, 8);
        let before = engine.world.clone();
        let ok = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.restore_world_from_stash()
        }))
        .unwrap_or(false);
        assert!(!ok);
        assert_eq!(engine.world, before);
    }

    #[test]
    fn restore_destroys_leftover_mission_objects() {
        let mut engine = engine_with_map(16, 16);
        let home_droid = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Home"));
        assert!(engine.capture_world_into_stash());

        // Populate the now-live (mission) world.
        engine.world.map = TileMap::new(8, 8);
        let enemy = engine.create_droid(Droid::new(Player(1), DroidKind::Weapon, "Raider"));

        assert!(engine.restore_world_from_stash());
        assert!(engine.droids.get(enemy).is_none(), "mission droid destroyed");
        assert!(engine.droids.get(home_droid).is_some(), "home droid kept");
        assert!(engine.world.contains_droid(home_droid));
    }

    #[test]
    fn vanish_droid_removes_single_owner() {
        let mut engine = engine_with_map(8, 8);
        let id = engine.create_droid(Droid::new(Player(2), DroidKind::Weapon, "Scout"));
        engine.vanish_droid(id);
        assert!(engine.droids.get(id).is_none());
        assert!(!engine.world.contains_droid(id));
    }

    #[test]
    fn vanish_commander_dissolves_group() {
        let mut engine = engine_with_map(8, 8);
        let cmd = engine.create_droid(Droid::new(Player(0), DroidKind::Commander, "Cmdr"));
        let gid = engine.droids[cmd].group.expect("commander has a group");
        engine.vanish_droid(cmd);
        assert!(engine.groups.get(gid).is_none());
    }

    #[test]
    fn stash_list_transfers() {
        let mut engine = engine_with_map(8, 8);
        let id = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));

        assert!(engine.move_droid_to_stash_list(id));
        assert!(!engine.world.contains_droid(id));
        assert!(engine.mission.stash.contains_droid(id));
        // Not there twice.
        assert!(!engine.move_droid_to_stash_list(id));

        assert!(engine.move_droid_to_live_list(id));
        assert!(engine.world.contains_droid(id));
    }

    #[test]
    fn tile_occupancy_tracks_positions() {
        let mut engine = engine_with_map(8, 8);
        let id = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        let tile = TilePos::new(4, 4);
        assert!(!engine.tile_occupied(tile));
        engine.set_droid_position(id, crate::map::world_coord(4), crate::map::world_coord(4));
        assert!(engine.tile_occupied(tile));
    }

    #[test]
    fn pick_free_tile_avoids_occupied_and_zones() {
        let mut engine = engine_with_map(16, 16);
        let blocker = engine.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Blocker"));
        let start = TilePos::new(8, 8);
        engine.set_droid_position(blocker, crate::map::world_coord(8), crate::map::world_coord(8));
        engine.landing_zones.set(0, 7, 7, 9, 9);

        let picked = engine
            .pick_free_tile_for(start, MovementClass::Ground, true)
            .expect("tile found");
        assert_ne!(picked, start);
        assert!(!engine.landing_zones.within_any(picked));
    }
}
