//! The transporter carrier protocol: capacity accounting, boarding and
//! disembarking, and the flight order state machine.
//!
//! Capacity is derived, never stored: the sum of each passenger's space
//! requirement, compared against [`TRANSPORTER_CAPACITY`]. In campaign games
//! every droid weighs one slot; in multiplayer the body-size class decides.
//!
//! Flight cycle, per transporter:
//! `None → TransportOut → None` (left the live map for the held list);
//! `None → TransportIn → None` (reinforcements landed and auto-unloaded;
//! entered via `WaitToFlyIn` while the ETA runs down);
//! `None → TransportReturn → None` (empty carrier flew back for more).
//! Flight legs are tick-timed; movement simulation is a collaborator and is
//! not modeled here.

use crate::droid::{DroidKind, FlightAction, Order};
use crate::engine::{Engine, GameMode};
use crate::event::Event;
use crate::group::{Group, GroupKind};
use crate::id::DroidId;
use crate::map::{MovementClass, TilePos, map_coord, world_coord};
use crate::sim::{GAME_TICKS_PER_SEC, Ticks};

/// Cargo slots per transporter.
pub const TRANSPORTER_CAPACITY: u32 = 10;

/// Flight time for an outbound or returning leg.
pub const TRANSPORT_OUT_TIME: Ticks = 4 * GAME_TICKS_PER_SEC;

/// Flight time from release at the map entry to touchdown on the LZ.
pub const TRANSPORT_IN_TIME: Ticks = 4 * GAME_TICKS_PER_SEC;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from carrier operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransporterError {
    #[error("droid {0:?} does not exist")]
    UnknownDroid(DroidId),
    #[error("droid {0:?} is not a transporter")]
    NotATransporter(DroidId),
    #[error("transporters cannot board other transporters")]
    NotLoadable,
    #[error("not enough room in the transport")]
    CapacityExceeded,
    #[error("droid {0:?} is not in a world list")]
    NotInWorld(DroidId),
    #[error("droid {droid:?} is not aboard transporter {transporter:?}")]
    NotAboard {
        transporter: DroidId,
        droid: DroidId,
    },
    #[error("transporter {0:?} is mid-flight")]
    MidFlight(DroidId),
}

// ---------------------------------------------------------------------------
// Capacity accounting
// ---------------------------------------------------------------------------

impl Engine {
    /// Cargo slots the droid occupies: body-size class in multiplayer, a
    /// flat one slot in campaign games.
    pub fn transporter_space_required(&self, droid: DroidId) -> u32 {
        match self.mode {
            GameMode::Multiplayer => self
                .droids
                .get(droid)
                .map(|d| d.body_size.cargo_slots())
                .unwrap_or(1),
            GameMode::Campaign => 1,
        }
    }

    /// Slots still free aboard a transporter.
    pub fn remaining_capacity(&self, transporter: DroidId) -> u32 {
        let used: u32 = self
            .passengers(transporter)
            .iter()
            .map(|&p| self.transporter_space_required(p))
            .sum();
        TRANSPORTER_CAPACITY.saturating_sub(used)
    }

    /// Whether a transporter is carrying nothing.
    pub fn transporter_is_empty(&self, transporter: DroidId) -> bool {
        self.passengers(transporter).is_empty()
    }

    /// Whether `candidate` still fits aboard. Pure; no cue.
    pub fn check_capacity(&self, transporter: DroidId, candidate: DroidId) -> bool {
        self.remaining_capacity(transporter) >= self.transporter_space_required(candidate)
    }

    /// As [`Engine::check_capacity`], but requests the "transport full" UI
    /// cue when this candidate would exactly fill the hold.
    pub fn check_capacity_cued(&mut self, transporter: DroidId, candidate: DroidId) -> bool {
        let remaining = self.remaining_capacity(transporter);
        let required = self.transporter_space_required(candidate);
        if remaining < required {
            return false;
        }
        if remaining == required {
            let tick = self.sim_state.tick;
            self.event_bus
                .publish(Event::TransporterFull { transporter, tick });
        }
        true
    }

    /// Whether a transporter is observed flying: any active flight action,
    /// or (multiplayer) moving or disembarking under orders.
    pub fn transporter_is_flying(&self, transporter: DroidId) -> bool {
        let Some(d) = self.droids.get(transporter) else {
            return false;
        };
        if matches!(
            d.flight,
            FlightAction::TransportOut | FlightAction::TransportIn | FlightAction::TransportReturn
        ) {
            return true;
        }
        self.mode == GameMode::Multiplayer
            && matches!(d.order, Order::Move { .. } | Order::Disembark { .. })
    }

    // -----------------------------------------------------------------------
    // Boarding
    // -----------------------------------------------------------------------

    /// Board a droid: removed from whichever world list holds it, residual
    /// map state cleared, added to the cargo group. A commander leaves its
    /// command group for the duration; the relationship is re-created on
    /// unload.
    pub fn load_droid(
        &mut self,
        transporter: DroidId,
        droid: DroidId,
    ) -> Result<(), TransporterError> {
        if transporter == droid {
            return Err(TransporterError::NotLoadable);
        }
        let t = self
            .droids
            .get(transporter)
            .ok_or(TransporterError::UnknownDroid(transporter))?;
        if !t.is_transporter() {
            return Err(TransporterError::NotATransporter(transporter));
        }
        let d = self
            .droids
            .get(droid)
            .ok_or(TransporterError::UnknownDroid(droid))?;
        if d.is_transporter() {
            return Err(TransporterError::NotLoadable);
        }
        let player = d.player;

        if !self.check_capacity_cued(transporter, droid) {
            log::debug!("no room in transport {transporter:?} for {droid:?}");
            return Err(TransporterError::CapacityExceeded);
        }

        let Some(gid) = self.cargo_group(transporter) else {
            return Err(TransporterError::NotATransporter(transporter));
        };

        // The droid may be on the live map or back in the held home lists.
        let removed = self.world.remove_droid(player, droid)
            || self.mission.stash.remove_droid(player, droid);
        if !removed {
            return Err(TransporterError::NotInWorld(droid));
        }

        // Suspend any command-group membership for the trip.
        if let Some(old) = self.droids[droid].group {
            if let Some(g) = self.groups.get_mut(old) {
                g.remove(droid);
                if g.is_empty() {
                    self.groups.remove(old);
                }
            }
        }

        self.groups[gid].add(droid);
        let d = &mut self.droids[droid];
        d.group = Some(gid);
        d.clear_map_state();
        d.order = Order::Stop;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Disembarking
    // -----------------------------------------------------------------------

    /// Disembark one droid near a destination on the live map. Refused
    /// while the transporter is mid-flight. A droid that cannot be placed
    /// anywhere vanishes (logged) rather than staying half-owned.
    pub fn unload_droid(
        &mut self,
        transporter: DroidId,
        droid: DroidId,
        x: u32,
        y: u32,
    ) -> Result<(), TransporterError> {
        let t = self
            .droids
            .get(transporter)
            .ok_or(TransporterError::UnknownDroid(transporter))?;
        if !t.is_transporter() {
            return Err(TransporterError::NotATransporter(transporter));
        }
        if self.transporter_is_flying(transporter) {
            return Err(TransporterError::MidFlight(transporter));
        }
        let gid = self
            .cargo_group(transporter)
            .ok_or(TransporterError::NotATransporter(transporter))?;
        if !self.groups[gid].contains(droid) {
            return Err(TransporterError::NotAboard { transporter, droid });
        }

        self.groups[gid].remove(droid);
        let player = self.droids[droid].player;
        self.droids[droid].group = None;
        self.world.add_droid(player, droid);
        self.place_disembarked(droid, TilePos::new(map_coord(x), map_coord(y)));

        // Placement may have destroyed the droid if the map was full.
        let mut is_commander = false;
        if let Some(d) = self.droids.get_mut(droid) {
            d.order = Order::Stop;
            // Back under the player's hand immediately.
            d.selected = true;
            is_commander = d.kind == DroidKind::Commander;
        }
        if is_commander {
            self.recreate_command_group(droid);
        }
        Ok(())
    }

    /// Disembark everybody. With `going_home`, passengers land on the
    /// *stashed* home map (placement runs inside a swap round trip) — the
    /// path taken when a transporter ferries units back from an off-world
    /// mission.
    pub fn unload_transporter(&mut self, transporter: DroidId, x: u32, y: u32, going_home: bool) {
        let Some(t) = self.droids.get(transporter) else {
            log::warn!("unload of unknown transporter {transporter:?}");
            return;
        };
        if !t.is_transporter() {
            log::error!("unload target {transporter:?} is not a transporter");
            return;
        }
        let player = t.player;
        let tick = self.sim_state.tick;
        let target = TilePos::new(map_coord(x), map_coord(y));

        let Some(gid) = self.cargo_group(transporter) else {
            log::error!("transporter {transporter:?} has no cargo group");
            return;
        };
        for droid in self.groups[gid].take_members() {
            let Some(d) = self.droids.get_mut(droid) else {
                continue;
            };
            d.group = None;
            let owner = d.player;
            if going_home {
                self.mission.stash.add_droid(owner, droid);
                self.swap_world_states();
                self.place_disembarked(droid, target);
                self.swap_world_states();
            } else {
                self.world.add_droid(owner, droid);
                self.place_disembarked(droid, target);
            }
            let campaign = self.mode == GameMode::Campaign;
            let mut is_commander = false;
            if let Some(d) = self.droids.get_mut(droid) {
                d.order = Order::Stop;
                d.selected = false;
                if campaign {
                    // So VTOLs don't try to rearm on another map.
                    d.base = None;
                }
                is_commander = d.kind == DroidKind::Commander;
            }
            if is_commander {
                self.recreate_command_group(droid);
            }
        }

        self.event_bus.publish(Event::TransporterLanded {
            transporter,
            player,
            tick,
        });

        if self.mode == GameMode::Campaign && !going_home {
            // Send the empty carrier back off the map for another load.
            let (ex, ey) = self.transporter_exit(player);
            let d = &mut self.droids[transporter];
            d.selected = false;
            d.order = Order::TransportReturn { x: ex, y: ey };
            d.flight = FlightAction::TransportReturn;
            d.flight_started = Some(tick);
            self.mission.launch_time = Some(tick);
        }
    }

    /// Find a landing tile near the target (zone-excluded search, expanding
    /// outward) and place the droid there; destroy it if the map is full.
    fn place_disembarked(&mut self, droid: DroidId, target: TilePos) {
        match self.pick_free_tile_for(target, MovementClass::Ground, true) {
            Some(t) => self.set_droid_position(droid, world_coord(t.x), world_coord(t.y)),
            None => {
                log::error!("unable to find a valid disembark location for {droid:?}");
                self.vanish_droid(droid);
            }
        }
    }

    /// A commander stepping off a transporter gets a fresh command group.
    fn recreate_command_group(&mut self, commander: DroidId) {
        let gid = self
            .groups
            .insert(Group::new(GroupKind::Command { leader: commander }));
        self.groups[gid].add(commander);
        self.droids[commander].group = Some(gid);
    }

    // -----------------------------------------------------------------------
    // Launching
    // -----------------------------------------------------------------------

    /// Send a transporter on its way. From the home world this starts the
    /// outbound leg toward the exit point; while off-world it parks the
    /// held transporter in the waiting state until the reinforcement ETA
    /// releases it.
    pub fn launch_transporter(&mut self, transporter: DroidId) -> Result<(), TransporterError> {
        let t = self
            .droids
            .get(transporter)
            .ok_or(TransporterError::UnknownDroid(transporter))?;
        if !t.is_transporter() {
            debug_assert!(false, "launch of a non-transporter droid");
            return Err(TransporterError::NotATransporter(transporter));
        }
        let player = t.player;
        let now = self.sim_state.tick;

        if !self.is_mission_offworld() {
            let (ex, ey) = self.transporter_exit(player);
            let d = &mut self.droids[transporter];
            d.order = Order::TransportOut { x: ex, y: ey };
            d.flight = FlightAction::TransportOut;
            d.flight_started = Some(now);
            self.mission.launch_time = Some(now);
        } else {
            let (lx, ly) = self.landing_zones.landing_position(player.index());
            let d = &mut self.droids[transporter];
            d.order = Order::TransportIn { x: lx, y: ly };
            d.flight = FlightAction::WaitToFlyIn;
            d.flight_started = Some(now);
            self.mission.reinforce_started = now;
        }

        self.event_bus.publish(Event::TransporterLaunched {
            transporter,
            player,
            tick: now,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flight state machine (per tick)
    // -----------------------------------------------------------------------

    /// Advance one transporter's flight. Returns `true` when the current
    /// leg has completed (or no leg is active).
    pub(crate) fn update_transporter(&mut self, transporter: DroidId) -> bool {
        let Some(d) = self.droids.get(transporter) else {
            return true;
        };
        debug_assert!(d.is_transporter(), "flight update on a non-transporter");
        let flight = d.flight;
        let started = d.flight_started.unwrap_or(0);
        let player = d.player;
        let now = self.sim_state.tick;

        if !matches!(
            flight,
            FlightAction::TransportOut
                | FlightAction::TransportIn
                | FlightAction::TransportReturn
        ) {
            return true;
        }

        // Flying to safety: once nothing is left to pick up, the level is
        // done — unless this carrier is already outbound.
        if player == self.selected_player
            && self.mission.droids_to_safety
            && flight != FlightAction::TransportOut
            && !self.mission_droids_remaining(player)
        {
            let d = &mut self.droids[transporter];
            d.flight = FlightAction::None;
            d.flight_started = None;
            d.order = Order::None;
            self.event_bus.publish(Event::StartNextLevel { tick: now });
            return true;
        }

        match flight {
            FlightAction::TransportOut if now >= started + TRANSPORT_OUT_TIME => {
                self.transport_out_arrived(transporter, player);
                true
            }
            FlightAction::TransportIn if now >= started + TRANSPORT_IN_TIME => {
                self.transport_in_arrived(transporter, player);
                true
            }
            FlightAction::TransportReturn if now >= started + TRANSPORT_OUT_TIME => {
                // Empty carrier back at the edge: available for another load.
                let tick = self.sim_state.tick;
                self.event_bus.publish(Event::TransporterOffMap {
                    transporter,
                    player,
                    tick,
                });
                self.move_transporter_off_world(transporter);
                true
            }
            _ => false,
        }
    }

    /// Outbound leg complete: the carrier leaves the live map.
    fn transport_out_arrived(&mut self, transporter: DroidId, player: crate::id::Player) {
        let tick = self.sim_state.tick;
        self.event_bus.publish(Event::TransporterOffMap {
            transporter,
            player,
            tick,
        });
        if self.mission.droids_to_safety {
            self.move_droids_to_safety(transporter);
        } else {
            self.move_transporter_off_world(transporter);
        }
    }

    /// Fly-in leg complete: touch down on the LZ and disembark everybody.
    fn transport_in_arrived(&mut self, transporter: DroidId, player: crate::id::Player) {
        let tick = self.sim_state.tick;
        let Some(d) = self.droids.get(transporter) else {
            return;
        };
        let (lx, ly) = match d.order {
            Order::TransportIn { x, y } => (x, y),
            _ => self.landing_zones.landing_position(player.index()),
        };

        // The very first delivery of a mission lands silently.
        if self.mission.first_transporter_done {
            self.event_bus.publish(Event::ReinforcementsLanded {
                transporter,
                player,
                tick,
            });
        }
        self.mission.first_transporter_done = true;

        let d = &mut self.droids[transporter];
        d.flight = FlightAction::None;
        d.flight_started = None;
        d.order = Order::None;
        self.set_droid_position(transporter, lx, ly);

        self.unload_transporter(transporter, lx, ly, false);
    }

    /// Move a live transporter into the held home lists (it flew off the
    /// edge of the world). Fires the no-reinforcements-left cue when the
    /// held list has nothing more to deliver.
    pub fn move_transporter_off_world(&mut self, transporter: DroidId) {
        let Some(d) = self.droids.get(transporter) else {
            return;
        };
        if !d.is_transporter() {
            log::debug!("droid {transporter:?} is not a transporter");
            return;
        }
        let player = d.player;
        if !self.move_droid_to_stash_list(transporter) {
            return;
        }
        let d = &mut self.droids[transporter];
        d.flight = FlightAction::None;
        d.flight_started = None;
        d.order = Order::None;
        // Held transporters have no position on any map.
        d.pos = None;

        if player == self.selected_player {
            let anything_left = self.mission.stash.droids[player]
                .iter()
                .any(|&id| self.droids.get(id).is_some_and(|x| !x.is_transporter()));
            if !anything_left {
                let tick = self.sim_state.tick;
                self.event_bus
                    .publish(Event::NoReinforcementsLeft { player, tick });
            }
        }
    }

    /// A carrier reached the world edge while flying units to safety: its
    /// whole cargo and the carrier itself go into the held home lists.
    pub fn move_droids_to_safety(&mut self, transporter: DroidId) {
        let Some(t) = self.droids.get(transporter) else {
            return;
        };
        debug_assert!(t.is_transporter(), "unit is not a transporter");
        if !t.is_transporter() {
            return;
        }
        if let Some(gid) = self.cargo_group(transporter) {
            for p in self.groups[gid].take_members() {
                let Some(pd) = self.droids.get_mut(p) else {
                    continue;
                };
                pd.group = None;
                pd.pos = None;
                let owner = pd.player;
                self.mission.stash.add_droid(owner, p);
            }
        }
        if self.move_droid_to_stash_list(transporter) {
            let d = &mut self.droids[transporter];
            d.flight = FlightAction::None;
            d.flight_started = None;
            d.order = Order::None;
            d.pos = None;
        }
    }

    /// Force every in-flight transporter to give up its passengers before a
    /// mission transition destroys the map under them. Passengers land in
    /// the live lists when the mission is off-world (the return
    /// reconciliation will place them), otherwise in the held lists.
    pub fn empty_transporters(&mut self, off_world: bool) {
        let sel = self.selected_player;

        for transporter in self.world.droids[sel].clone() {
            let Some(d) = self.droids.get(transporter) else {
                continue;
            };
            if !d.is_transporter() || d.flight != FlightAction::TransportIn {
                continue;
            }
            log::debug!("emptying in-flight transporter {transporter:?}");
            if let Some(gid) = self.cargo_group(transporter) {
                for p in self.groups[gid].take_members() {
                    let Some(pd) = self.droids.get_mut(p) else {
                        continue;
                    };
                    pd.group = None;
                    pd.pos = None;
                    let owner = pd.player;
                    if off_world {
                        self.world.add_droid(owner, p);
                    } else {
                        self.mission.stash.add_droid(owner, p);
                    }
                }
            }
            self.vanish_droid(transporter);
        }

        // Transporters still waiting to come over give up their cargo into
        // the held lists; the carriers themselves are dealt with by the
        // end-of-mission reset.
        for transporter in self.mission.stash.droids[sel].clone() {
            let Some(d) = self.droids.get(transporter) else {
                continue;
            };
            if !d.is_transporter() {
                continue;
            }
            if let Some(gid) = self.cargo_group(transporter) {
                for p in self.groups[gid].take_members() {
                    let Some(pd) = self.droids.get_mut(p) else {
                        continue;
                    };
                    pd.group = None;
                    pd.pos = None;
                    let owner = pd.player;
                    self.mission.stash.add_droid(owner, p);
                }
            }
        }
    }

    /// Reset the transporter scheduling state between missions.
    pub(crate) fn init_transporters(&mut self) {
        self.mission.launch_time = None;
        self.mission.first_transporter_done = false;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
