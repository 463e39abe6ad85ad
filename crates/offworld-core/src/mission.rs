//! The mission lifecycle state machine.
//!
//! A session is always in exactly one mission state; `None` is both initial
//! and terminal. [`Engine::start_mission`] is legal only from `None` and
//! either completes fully or fails before any world mutation begins;
//! [`Engine::end_mission`] runs the logical inverse of the matching start
//! handler and always returns the machine to `None`.
//!
//! The mapping from mission type to behavior lives in one table
//! ([`MissionType::profile`]): per type, whether the mission is off-world,
//! whether reinforcements can fly, whether a level load is involved, and the
//! start/end handler pair. Timers (mission countdown, reinforcement ETA) are
//! tick-counted and advance only inside [`Engine::step`].
//!
//! [`Engine::step`]: crate::engine::Engine::step

use crate::droid::{FlightAction, Order};
use crate::engine::Engine;
use crate::event::Event;
use crate::id::{DroidId, MAX_PLAYERS, PerPlayer, Player};
use crate::landing::clamp_entry_tile;
use crate::level::{LevelData, ObjectPolicy};
use crate::map::{MovementClass, TilePos, WorldPos, direction_to, world_coord};
use crate::sim::{GAME_TICKS_PER_SEC, ONE_MINUTE, Ticks};
use crate::structure::StructureKind;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};

/// Height above the entry tile at which reinforcement flights spawn.
pub const OFFSCREEN_HEIGHT: u32 = 600;

/// Lead time before the ETA elapses at which a waiting transporter is
/// released to start its approach.
pub const TRANSPORTER_REINFORCE_LEADIN: Ticks = 10 * GAME_TICKS_PER_SEC;

// ---------------------------------------------------------------------------
// Mission types and the behavior table
// ---------------------------------------------------------------------------

/// Every mission state the machine can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissionType {
    /// No mission running; initial and terminal state.
    #[default]
    None,
    /// First mission of a campaign: fresh world, prior object memory
    /// discarded.
    CampaignStart,
    /// Between campaigns: survivors carried forward into a holding list.
    CampaignChange,
    /// The playable area grows; existing objects are kept.
    Expand,
    /// As `Expand`, but the player's droids sit out the mission in limbo.
    ExpandLimbo,
    /// Administrative interlude; no level load.
    Between,
    /// Off-world mission whose own object lists survive the return trip.
    OffworldKeep,
    /// Off-world mission whose object lists are destroyed on return.
    OffworldClear,
    /// Off-world mission whose survivors enter limbo on return.
    OffworldKeepLimbo,
}

/// Per-type behavior record. One row of the dispatch table.
pub struct MissionProfile {
    /// The home world sits in the stash while this mission runs.
    pub offworld: bool,
    /// Reinforcement transporters can fly during this mission.
    pub reinforcible: bool,
    /// Starting this mission applies level data.
    pub loads_level: bool,
    pub start: fn(&mut Engine, Option<&LevelData>) -> Result<(), MissionError>,
    pub end: fn(&mut Engine),
}

static PROFILE_NONE: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: false,
    loads_level: false,
    start: Engine::start_between,
    end: Engine::end_noop,
};
static PROFILE_CAMPAIGN_START: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: true,
    loads_level: true,
    start: Engine::start_campaign_start,
    end: Engine::end_campaign,
};
static PROFILE_CAMPAIGN_CHANGE: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: true,
    loads_level: true,
    start: Engine::start_campaign_change,
    end: Engine::end_campaign,
};
static PROFILE_EXPAND: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: false,
    loads_level: true,
    start: Engine::start_expand,
    end: Engine::end_noop,
};
static PROFILE_EXPAND_LIMBO: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: false,
    loads_level: true,
    start: Engine::start_expand_limbo,
    end: Engine::end_expand_limbo,
};
static PROFILE_BETWEEN: MissionProfile = MissionProfile {
    offworld: false,
    reinforcible: false,
    loads_level: false,
    start: Engine::start_between,
    end: Engine::end_noop,
};
static PROFILE_OFFWORLD_KEEP: MissionProfile = MissionProfile {
    offworld: true,
    reinforcible: true,
    loads_level: true,
    start: Engine::start_offworld_keep,
    end: Engine::end_offworld,
};
static PROFILE_OFFWORLD_CLEAR: MissionProfile = MissionProfile {
    offworld: true,
    reinforcible: true,
    loads_level: true,
    start: Engine::start_offworld_clear,
    end: Engine::end_offworld,
};
static PROFILE_OFFWORLD_KEEP_LIMBO: MissionProfile = MissionProfile {
    offworld: true,
    reinforcible: true,
    loads_level: true,
    start: Engine::start_offworld_keep,
    end: Engine::end_offworld_keep_limbo,
};

impl MissionType {
    /// The behavior record for this type.
    pub fn profile(self) -> &'static MissionProfile {
        match self {
            MissionType::None => &PROFILE_NONE,
            MissionType::CampaignStart => &PROFILE_CAMPAIGN_START,
            MissionType::CampaignChange => &PROFILE_CAMPAIGN_CHANGE,
            MissionType::Expand => &PROFILE_EXPAND,
            MissionType::ExpandLimbo => &PROFILE_EXPAND_LIMBO,
            MissionType::Between => &PROFILE_BETWEEN,
            MissionType::OffworldKeep => &PROFILE_OFFWORLD_KEEP,
            MissionType::OffworldClear => &PROFILE_OFFWORLD_CLEAR,
            MissionType::OffworldKeepLimbo => &PROFILE_OFFWORLD_KEEP_LIMBO,
        }
    }
}

/// Errors from mission lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("a mission is already in progress: {0:?}")]
    MissionInProgress(MissionType),
    #[error("mission type None cannot be started")]
    InvalidType,
    #[error("mission type {0:?} requires level data")]
    LevelRequired(MissionType),
    #[error(transparent)]
    Level(#[from] crate::level::LevelError),
    #[error("the world stash is unavailable for capture")]
    StashUnavailable,
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Reinforcement schedule state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReinforcementTime {
    /// No reinforcements on this mission.
    #[default]
    Never,
    /// Flight time from release to arrival, in ticks.
    At(Ticks),
    /// Landing zone compromised: the countdown display is masked but the
    /// underlying reference time is kept, so clearing the compromise
    /// resumes the schedule.
    Compromised,
}

/// Which countdown milestones have not fired yet. Re-armed whenever the
/// mission time is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownPending {
    pub activated: bool,
    pub ten: bool,
    pub five: bool,
    pub three: bool,
    pub two: bool,
    pub one: bool,
}

impl CountdownPending {
    pub fn armed() -> Self {
        Self {
            activated: true,
            ten: true,
            five: true,
            three: true,
            two: true,
            one: true,
        }
    }
}

impl Default for CountdownPending {
    fn default() -> Self {
        Self::armed()
    }
}

// ---------------------------------------------------------------------------
// MissionContext
// ---------------------------------------------------------------------------

/// Process-wide mission bookkeeping: the current mission type, timers, the
/// stashed world, the limbo lists, and everything captured around a
/// transition. Lives for the whole session; reset between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionContext {
    pub mission_type: MissionType,

    /// Mission time budget; `None` means no countdown on this mission.
    pub time_budget: Option<Ticks>,
    /// Tick at which the budget started counting.
    pub start_time: Ticks,
    /// While set, the countdown is frozen at this tick (cheat override).
    pub cheat_time: Option<Ticks>,
    /// Whether the timeout event has already fired for this timer.
    pub timeout_fired: bool,
    pub countdown: CountdownPending,
    /// Whether countdown milestone cues should fire at all.
    pub play_countdown: bool,

    pub eta: ReinforcementTime,
    /// Reference tick the ETA counts from (set at launch).
    pub reinforce_started: Ticks,
    /// Tick of the most recent transporter launch.
    pub launch_time: Option<Ticks>,
    /// Suppresses the "reinforcements arrived" cue for the very first load.
    pub first_transporter_done: bool,

    /// Centre of the selected player's landing zone back home, recorded at
    /// off-world departure.
    pub home_lz: TilePos,
    pub transporter_entry: [TilePos; MAX_PLAYERS],
    pub transporter_exit: [TilePos; MAX_PLAYERS],

    /// The non-live world. Also serves as the carry-forward holding list
    /// between campaigns (lists occupied, no terrain).
    pub stash: WorldState,
    /// Whether a full world (terrain included) is currently stashed.
    pub stash_in_use: bool,

    /// Droids that exist in neither world, waiting for a future mission.
    pub limbo: PerPlayer<Vec<DroidId>>,

    /// Per-player power captured at off-world departure.
    pub saved_power: [u32; MAX_PLAYERS],
    /// Whether the off-world mission's own lists survive the return trip.
    pub off_world_keep_lists: bool,
    /// Units are being flown to safety rather than fighting to the end.
    pub droids_to_safety: bool,

    pub campaign_number: u32,
}

impl MissionContext {
    pub fn new() -> Self {
        Self {
            play_countdown: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle entry points
// ---------------------------------------------------------------------------

impl Engine {
    /// Reset all mission state for a fresh session.
    pub fn init_mission(&mut self) {
        log::debug!("initialising mission state");
        self.mission = MissionContext::new();
        self.landing_zones.clear_all();
    }

    /// Begin a mission. Legal only from state `None`; on failure nothing
    /// has been applied and the state is still `None`.
    pub fn start_mission(
        &mut self,
        ty: MissionType,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        log::debug!("start_mission {ty:?}");
        if ty == MissionType::None {
            return Err(MissionError::InvalidType);
        }
        if self.mission.mission_type != MissionType::None {
            log::debug!("already on a mission ({:?})", self.mission.mission_type);
            return Err(MissionError::MissionInProgress(self.mission.mission_type));
        }

        let profile = ty.profile();
        if profile.loads_level && level.is_none() {
            return Err(MissionError::LevelRequired(ty));
        }
        // Validate before any handler mutates anything: a bad level must
        // leave no trace.
        if let Some(level) = level {
            level.validate()?;
        }

        self.mission.first_transporter_done = false;
        (profile.start)(self, level)?;
        self.mission.mission_type = ty;

        if profile.offworld {
            // Credit what the home base had banked into the mission pool.
            self.adjust_mission_power();
        }
        if self.can_reinforce() {
            let tick = self.sim_state.tick;
            self.event_bus.publish(Event::MissionTimersArmed { tick });
        }
        Ok(())
    }

    /// Restore the mission type directly when resuming from a saved game.
    pub fn resume_mission_from_save(&mut self, ty: MissionType) {
        self.mission.mission_type = ty;
    }

    /// End the current mission: force in-flight transporters to give up
    /// their passengers, run the type's end handler, and return the machine
    /// to `None`. A no-op (logged) when no mission is running.
    pub fn end_mission(&mut self) {
        let ty = self.mission.mission_type;
        if ty == MissionType::None {
            log::debug!("end_mission: already returned from mission");
            return;
        }
        log::debug!("end_mission {ty:?}");
        (ty.profile().end)(self);

        self.mission.cheat_time = None;
        self.mission.play_countdown = true;
        self.mission.mission_type = MissionType::None;
        self.init_transporters();
    }

    // -----------------------------------------------------------------------
    // Read-only mission queries
    // -----------------------------------------------------------------------

    /// Whether the live world is an off-world mission map.
    pub fn is_mission_offworld(&self) -> bool {
        self.mission.mission_type.profile().offworld
    }

    /// Whether the mission type supports reinforcement flights.
    pub fn mission_for_reinforcements(&self) -> bool {
        self.mission.mission_type.profile().reinforcible
    }

    /// Whether reinforcements can actually fly: right mission type and a
    /// schedule has been set.
    pub fn can_reinforce(&self) -> bool {
        !matches!(self.mission.eta, ReinforcementTime::Never) && self.mission_for_reinforcements()
    }

    pub fn is_limbo_expand(&self) -> bool {
        self.mission.mission_type == MissionType::ExpandLimbo
    }

    /// Whether the player still has non-transporter units on the live map.
    pub fn mission_droids_remaining(&self, player: Player) -> bool {
        self.world.droids[player]
            .iter()
            .any(|&id| self.droids.get(id).is_some_and(|d| !d.is_transporter()))
    }

    // -----------------------------------------------------------------------
    // Start handlers (one per table row)
    // -----------------------------------------------------------------------

    pub(crate) fn start_campaign_start(
        &mut self,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::CampaignStart))?;
        let tick = self.sim_state.tick;
        self.event_bus.publish(Event::IntelligenceCleared { tick });
        self.clear_campaign_units();
        self.apply_level(level, ObjectPolicy::ClearObjects);
        self.mission.off_world_keep_lists = false;
        Ok(())
    }

    pub(crate) fn start_campaign_change(
        &mut self,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::CampaignChange))?;
        let tick = self.sim_state.tick;
        self.event_bus.publish(Event::IntelligenceCleared { tick });
        self.clear_campaign_units();
        self.save_campaign_data();
        self.apply_level(level, ObjectPolicy::ClearObjects);
        self.mission.off_world_keep_lists = false;
        Ok(())
    }

    pub(crate) fn start_offworld_keep(
        &mut self,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::OffworldKeep))?;
        self.save_mission_data()?;
        self.apply_level(level, ObjectPolicy::ClearObjects);
        self.mission.off_world_keep_lists = true;
        // The activation cue was played at the between stage.
        self.mission.countdown.activated = false;
        Ok(())
    }

    pub(crate) fn start_offworld_clear(
        &mut self,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::OffworldClear))?;
        self.save_mission_data()?;
        self.apply_level(level, ObjectPolicy::ClearObjects);
        self.mission.off_world_keep_lists = false;
        self.mission.countdown.activated = false;
        Ok(())
    }

    pub(crate) fn start_expand(&mut self, level: Option<&LevelData>) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::Expand))?;
        self.apply_level(level, ObjectPolicy::KeepObjects);
        self.mission.off_world_keep_lists = false;
        Ok(())
    }

    pub(crate) fn start_expand_limbo(
        &mut self,
        level: Option<&LevelData>,
    ) -> Result<(), MissionError> {
        let level = level.ok_or(MissionError::LevelRequired(MissionType::ExpandLimbo))?;
        // Stale holdovers from a previous campaign must not leak into limbo.
        self.process_previous_camp_droids();
        self.migrate_to_limbo(self.selected_player);
        self.apply_level(level, ObjectPolicy::KeepObjects);
        self.mission.off_world_keep_lists = false;
        Ok(())
    }

    pub(crate) fn start_between(&mut self, _level: Option<&LevelData>) -> Result<(), MissionError> {
        self.mission.off_world_keep_lists = false;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // End handlers (one per table row)
    // -----------------------------------------------------------------------

    pub(crate) fn end_noop(&mut self) {}

    pub(crate) fn end_campaign(&mut self) {
        self.empty_transporters(false);
        self.process_previous_camp_droids();
    }

    pub(crate) fn end_offworld(&mut self) {
        self.empty_transporters(true);
        self.process_mission();
        let restored = self.restore_world_from_stash();
        debug_assert!(restored, "off-world mission ended with no stashed world");
        self.mission_reset_droids();
    }

    pub(crate) fn end_offworld_keep_limbo(&mut self) {
        self.empty_transporters(true);
        self.migrate_to_limbo(self.selected_player);
        let restored = self.restore_world_from_stash();
        debug_assert!(restored, "off-world mission ended with no stashed world");
        self.mission_reset_droids();
    }

    pub(crate) fn end_expand_limbo(&mut self) {
        // Any droid never brought out of limbo mid-mission comes out now.
        self.materialize_limbo_droids();
    }

    /// Mid-mission script path: bring the limbo droids in and downgrade the
    /// mission to a plain expand.
    pub fn reset_limbo_mission(&mut self) {
        self.materialize_limbo_droids();
        self.mission.mission_type = MissionType::Expand;
    }

    /// Abandoning a session mid-off-world (the player quit): put the home
    /// world back and discard the mission world, skipping the normal return
    /// reconciliation.
    pub fn shutdown_offworld(&mut self) {
        log::debug!(
            "mission shutdown, currently {}",
            if self.is_mission_offworld() {
                "off-world"
            } else {
                "on the main map"
            }
        );
        if self.is_mission_offworld() {
            let restored = self.restore_world_from_stash();
            debug_assert!(restored, "off-world with nothing stashed");
        }
        self.mission.mission_type = MissionType::None;
    }

    /// Session teardown: the held home lists may still carry droids moved
    /// between campaigns (passengers included), and limbo may hold banked
    /// survivors. Free both.
    pub fn release_mission(&mut self) {
        for player in Player::all() {
            for id in self.mission.stash.droids[player].clone() {
                for p in self.passengers(id) {
                    self.remove_droid_everywhere(p, false);
                }
                self.remove_droid_everywhere(id, false);
            }
            for id in self.mission.limbo[player].clone() {
                self.remove_droid_everywhere(id, false);
            }
        }
    }

    /// Remove every object belonging to a non-selected player, both worlds
    /// included. Called between campaigns so no enemy state leaks across.
    pub fn mission_destroy_objects(&mut self) {
        log::debug!("destroying non-selected players' objects");
        let sel = self.selected_player;
        for player in Player::all() {
            if player == sel {
                continue;
            }
            // Held list first: a held carrier's passengers are rescued into
            // the live list, which is drained right after.
            while let Some(&id) = self.mission.stash.droids[player].first() {
                self.remove_droid_everywhere(id, false);
            }
            while let Some(&id) = self.world.droids[player].first() {
                self.remove_droid_everywhere(id, false);
            }
            for sid in std::mem::take(&mut self.world.structures[player]) {
                self.structures.remove(sid);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Off-world departure and return bookkeeping
    // -----------------------------------------------------------------------

    /// Capture the home world ahead of an off-world mission, after applying
    /// the departure courtesies: builds with a builder on them complete,
    /// everything is repaired if a repair facility stands, orders stop.
    pub(crate) fn save_mission_data(&mut self) -> Result<(), MissionError> {
        if self.mission.stash_in_use {
            return Err(MissionError::StashUnavailable);
        }
        let sel = self.selected_player;

        // Structures a builder is actively working on.
        let building_targets: Vec<crate::id::StructureId> = self.world.droids[sel]
            .iter()
            .filter_map(|&id| match self.droids.get(id)?.order {
                Order::Build { target } => Some(target),
                _ => None,
            })
            .collect();

        let mut repair_exists = false;
        for &sid in &self.world.structures[sel].clone() {
            let Some(s) = self.structures.get_mut(sid) else {
                continue;
            };
            if !s.is_built() && building_targets.contains(&sid) {
                s.complete_build();
            }
            if matches!(s.kind, StructureKind::RepairFacility) && s.is_built() {
                repair_exists = true;
            }
        }

        for id in self.world.droids[sel].clone() {
            let Some(d) = self.droids.get(id) else {
                continue;
            };
            let keep_building = match d.order {
                Order::Build { target } => {
                    self.structures.get(target).is_some_and(|s| !s.is_built())
                }
                _ => false,
            };
            let damaged = d.is_damaged();
            let d = &mut self.droids[id];
            if repair_exists && damaged {
                d.repair_fully();
            }
            if !keep_building {
                d.order = Order::Stop;
            }
        }

        self.mission.home_lz = self.landing_zones.get(sel.index()).centre();
        self.save_mission_power();

        let captured = self.capture_world_into_stash();
        debug_assert!(captured, "stash availability was checked above");
        Ok(())
    }

    /// Reconcile the selected player's surviving droids at the end of an
    /// off-world mission: each one moves to the held home list and gets a
    /// landing tile near the home LZ, chosen against the *home* map via a
    /// swap round trip.
    pub(crate) fn process_mission(&mut self) {
        let sel = self.selected_player;
        let home = self.mission.home_lz;
        for id in self.world.droids[sel].clone() {
            if self.droids.get(id).is_none() {
                continue;
            }
            self.droids[id].order = Order::Stop;
            if !self.move_droid_to_stash_list(id) {
                continue;
            }
            // The droid now sits in the home lists; swap so placement sees
            // the home map, then swap straight back.
            self.swap_world_states();
            match self.pick_free_tile_for(home, MovementClass::Ground, false) {
                Some(t) => self.set_droid_position(id, world_coord(t.x), world_coord(t.y)),
                None => {
                    log::error!("no free home tile for returning droid {id:?}");
                    self.droids[id].pos = None;
                }
            }
            self.swap_world_states();
            let d = &mut self.droids[id];
            d.selected = false;
            d.base = None;
        }
    }

    /// Reset droid state after the home world is live again: orders stop
    /// (builders mid-build excepted), leftover transporters are destroyed,
    /// and droids that never left home are placed near their factory or HQ.
    pub(crate) fn mission_reset_droids(&mut self) {
        log::debug!("resetting droids after mission return");
        for player in Player::all() {
            for id in self.world.droids[player].clone() {
                let Some(d) = self.droids.get(id) else {
                    continue;
                };
                if d.is_transporter() {
                    self.vanish_droid(id);
                    continue;
                }
                let keep = d.kind.is_builder()
                    && matches!(d.order, Order::Build { target } if self.structures.contains_key(target));
                if !keep {
                    self.droids[id].order = Order::Stop;
                }
            }
        }

        let sel = self.selected_player;
        for id in self.world.droids[sel].clone() {
            let Some(d) = self.droids.get(id) else {
                continue;
            };
            if d.pos.is_some() {
                continue;
            }
            // Never left home: put it down next to its factory, or the HQ.
            let start = match d.base.and_then(|s| self.structures.get(s)) {
                Some(s) => match &s.kind {
                    StructureKind::Factory {
                        assembly_point: Some(ap),
                        ..
                    } => Some(*ap),
                    _ => Some(s.pos.tile()),
                },
                None => self.world.structures[sel].iter().find_map(|&sid| {
                    let s = self.structures.get(sid)?;
                    matches!(s.kind, StructureKind::Hq).then(|| s.pos.tile())
                }),
            };
            let Some(start) = start else {
                log::error!("nowhere to place returning droid {id:?}, removing");
                self.vanish_droid(id);
                continue;
            };
            match self.pick_free_tile_for(start, MovementClass::Ground, false) {
                Some(t) => {
                    self.set_droid_position(id, world_coord(t.x), world_coord(t.y));
                    self.droids[id].selected = false;
                }
                None => {
                    log::error!("unable to find a free location for droid {id:?}, removing");
                    self.vanish_droid(id);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Campaign carry-forward
    // -----------------------------------------------------------------------

    /// Move the selected player's survivors into the holding list at a
    /// campaign boundary. With move-to-safety active, transporters are
    /// emptied into the holding list first and then the *first* transporter
    /// found is re-filled to capacity, so the next campaign resumes with a
    /// loaded transporter. Everything else on the map is destroyed.
    pub(crate) fn save_campaign_data(&mut self) {
        log::debug!("saving campaign carry-forward data");
        let sel = self.selected_player;

        if self.mission.droids_to_safety {
            for id in self.world.droids[sel].clone() {
                let Some(d) = self.droids.get(id) else {
                    continue;
                };
                if !d.is_transporter() {
                    continue;
                }
                // Empty the transporter into the holding list.
                if let Some(gid) = self.cargo_group(id) {
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
                self.droids[id].pos = None;
                self.move_droid_to_stash_list(id);
            }
        } else {
            let ids = std::mem::take(&mut self.world.droids[sel]);
            for &id in &ids {
                if let Some(d) = self.droids.get_mut(id) {
                    d.pos = None;
                }
            }
            self.mission.stash.droids[sel].extend(ids);
        }

        if self.mission.droids_to_safety {
            // Reverse so the oldest units board first, then fill the first
            // transporter up to capacity.
            self.mission.stash.droids[sel].reverse();
            let held = self.mission.stash.droids[sel].clone();
            let transporter = held
                .iter()
                .copied()
                .find(|&id| self.droids.get(id).is_some_and(|d| d.is_transporter()));
            if let Some(trans) = transporter {
                for id in held {
                    if id == trans {
                        continue;
                    }
                    let Some(d) = self.droids.get(id) else {
                        continue;
                    };
                    if d.is_transporter() {
                        continue;
                    }
                    if !self.check_capacity(trans, id) {
                        break;
                    }
                    let player = d.player;
                    let Some(gid) = self.cargo_group(trans) else {
                        break;
                    };
                    self.mission.stash.remove_droid(player, id);
                    self.groups[gid].add(id);
                    self.droids[id].group = Some(gid);
                }
            }
        }

        // Clear every remaining live object: the next campaign's level load
        // rebuilds the world from scratch.
        for player in Player::all() {
            while let Some(&id) = self.world.droids[player].first() {
                self.remove_droid_everywhere(id, false);
            }
            for sid in std::mem::take(&mut self.world.structures[player]) {
                self.structures.remove(sid);
            }
            for fid in std::mem::take(&mut self.world.features[player]) {
                self.features.remove(fid);
            }
            self.world.flags[player].clear();
            self.world.extractors[player].clear();
        }
        self.world.sensors.clear();
        self.world.oil.clear();
    }

    /// Destroy any droids still sitting in the holding list from a previous
    /// campaign (passengers included).
    pub(crate) fn process_previous_camp_droids(&mut self) {
        let sel = self.selected_player;
        let ids = self.mission.stash.droids[sel].clone();
        if ids.is_empty() {
            return;
        }
        log::debug!("destroying {} held droids from a previous campaign", ids.len());
        for id in ids {
            for p in self.passengers(id) {
                self.vanish_droid(p);
            }
            self.vanish_droid(id);
        }
    }

    /// Sanitize lingering units at a campaign boundary: orders stopped,
    /// base assignments dropped, selection cleared.
    pub(crate) fn clear_campaign_units(&mut self) {
        let sel = self.selected_player;
        for id in self.world.droids[sel].clone() {
            if let Some(d) = self.droids.get_mut(id) {
                d.order = Order::Stop;
                d.base = None;
                d.selected = false;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Power bookkeeping
    // -----------------------------------------------------------------------

    pub(crate) fn save_mission_power(&mut self) {
        self.mission.saved_power = self.power;
    }

    /// Credit the banked home power into the mission pool.
    pub(crate) fn adjust_mission_power(&mut self) {
        let sel = self.selected_player.index();
        self.power[sel] += self.mission.saved_power[sel];
    }

    // -----------------------------------------------------------------------
    // Mission timer
    // -----------------------------------------------------------------------

    /// Set (or clear) the mission time budget, counting from now.
    pub fn set_mission_time(&mut self, budget: Option<Ticks>) {
        self.mission.time_budget = budget;
        self.mission.start_time = self.sim_state.tick;
        self.mission.timeout_fired = false;
        self.set_mission_countdown();
    }

    /// Arm the countdown milestone flags, skipping any the remaining time
    /// has already passed.
    pub fn set_mission_countdown(&mut self) {
        let remaining = self.mission_time_remaining().unwrap_or(0);
        let mut c = CountdownPending::armed();
        if remaining < 10 * ONE_MINUTE {
            c.ten = false;
        }
        if remaining < 5 * ONE_MINUTE {
            c.five = false;
        }
        if remaining < 3 * ONE_MINUTE {
            c.three = false;
        }
        if remaining < 2 * ONE_MINUTE {
            c.two = false;
        }
        if remaining < ONE_MINUTE {
            c.one = false;
        }
        self.mission.countdown = c;
    }

    /// Remaining mission time, `None` when no budget is set. Frozen while
    /// the cheat override is active.
    pub fn mission_time_remaining(&self) -> Option<Ticks> {
        let budget = self.mission.time_budget?;
        let elapsed = match self.mission.cheat_time {
            Some(cheat) => cheat.saturating_sub(self.mission.start_time),
            None => self.sim_state.tick.saturating_sub(self.mission.start_time),
        };
        Some(budget.saturating_sub(elapsed))
    }

    /// Enter or leave the cheat override. Leaving shifts the start time so
    /// the countdown resumes where it was frozen.
    pub fn set_mission_cheat_time(&mut self, cheating: bool) {
        let now = self.sim_state.tick;
        if cheating {
            self.mission.cheat_time = Some(now);
        } else if let Some(cheat) = self.mission.cheat_time.take() {
            self.mission.start_time += now.saturating_sub(cheat);
        }
    }

    /// Per-tick timer work: fire the timeout once when the budget runs out
    /// and emit the countdown milestone cues on the way down.
    pub(crate) fn update_mission_timers(&mut self) {
        let now = self.sim_state.tick;
        let Some(budget) = self.mission.time_budget else {
            return;
        };
        if self.mission.cheat_time.is_some() {
            return;
        }
        let elapsed = now.saturating_sub(self.mission.start_time);
        let remaining = budget.saturating_sub(elapsed);
        let mut events: Vec<Event> = Vec::new();

        if elapsed > budget && !self.mission.timeout_fired {
            self.mission.timeout_fired = true;
            events.push(Event::MissionTimeout { tick: now });
        }

        if remaining > 0 && self.mission.countdown.activated {
            self.mission.countdown.activated = false;
            events.push(Event::MissionTimerActivated { tick: now });
        }

        if self.mission.play_countdown {
            let c = &mut self.mission.countdown;
            if remaining < 10 * ONE_MINUTE && c.ten {
                c.ten = false;
                events.push(Event::CountdownMilestone {
                    minutes: 10,
                    tick: now,
                });
            } else if remaining < 5 * ONE_MINUTE && c.five {
                c.five = false;
                events.push(Event::CountdownMilestone {
                    minutes: 5,
                    tick: now,
                });
            } else if remaining < 3 * ONE_MINUTE && c.three {
                c.three = false;
                events.push(Event::CountdownMilestone {
                    minutes: 3,
                    tick: now,
                });
            } else if remaining < 2 * ONE_MINUTE && c.two {
                c.two = false;
                events.push(Event::CountdownMilestone {
                    minutes: 2,
                    tick: now,
                });
            } else if remaining < ONE_MINUTE && c.one {
                c.one = false;
                events.push(Event::CountdownMilestone {
                    minutes: 1,
                    tick: now,
                });
            }
        }

        for e in events {
            self.event_bus.publish(e);
        }
    }

    // -----------------------------------------------------------------------
    // Reinforcement schedule
    // -----------------------------------------------------------------------

    /// Set the reinforcement schedule for the current mission.
    pub fn set_reinforcement_eta(&mut self, eta: ReinforcementTime) {
        self.mission.eta = eta;
    }

    pub fn reinforcement_eta(&self) -> ReinforcementTime {
        self.mission.eta
    }

    /// Remaining time until the scheduled reinforcements arrive. `None`
    /// when no schedule is set or the LZ is compromised (display masked).
    pub fn reinforcement_time_remaining(&self) -> Option<Ticks> {
        match self.mission.eta {
            ReinforcementTime::At(eta) => {
                let elapsed = self
                    .sim_state
                    .tick
                    .saturating_sub(self.mission.reinforce_started);
                Some(eta.saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    /// Per-tick reinforcement work: when the schedule is inside the lead-in
    /// window, release a waiting transporter toward the landing zone.
    pub(crate) fn update_reinforcements(&mut self) {
        if !self.can_reinforce() {
            return;
        }
        let ReinforcementTime::At(_) = self.mission.eta else {
            return;
        };
        let Some(remaining) = self.reinforcement_time_remaining() else {
            return;
        };
        if remaining > TRANSPORTER_REINFORCE_LEADIN {
            return;
        }
        let player = self.selected_player;
        let waiting = self.mission.stash.droids[player].iter().copied().find(|&id| {
            self.droids
                .get(id)
                .is_some_and(|d| d.flight == FlightAction::WaitToFlyIn)
        });
        if let Some(transporter) = waiting {
            let tick = self.sim_state.tick;
            self.fly_transporters_in(player, false);
            self.event_bus.publish(Event::TransporterArrived {
                transporter,
                player,
                tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Reinforcement flights
    // -----------------------------------------------------------------------

    /// Fly one held, loaded transporter onto the live map: spawn it above
    /// the entry point facing the landing zone, fully repaired, with a
    /// fly-in order. One transporter per call.
    pub fn fly_transporters_in(&mut self, player: Player, track_camera: bool) {
        debug_assert!(player.is_valid(), "flying nonexistent player {}", player.0);
        if !player.is_valid() {
            log::error!("fly_transporters_in: invalid player {}", player.0);
            return;
        }
        let entry = self.mission.transporter_entry[player.index()];
        let (land_x, land_y) = self.landing_zones.landing_position(player.index());
        let now = self.sim_state.tick;

        for id in self.mission.stash.droids[player].clone() {
            let Some(d) = self.droids.get(id) else {
                continue;
            };
            if !d.is_transporter() {
                continue;
            }
            // Only transporters actually carrying droids fly in.
            if self.passengers(id).is_empty() {
                continue;
            }

            self.mission.stash.remove_droid(player, id);
            self.world.add_droid(player, id);

            let ex = world_coord(entry.x);
            let ey = world_coord(entry.y);
            let ez = self.world.map.tile_height(entry) as u32 + OFFSCREEN_HEIGHT;
            let pos = WorldPos::new(ex, ey, ez);
            let facing = direction_to(pos, WorldPos::new(land_x, land_y, 0));

            let selected = track_camera && player == self.selected_player;
            let d = &mut self.droids[id];
            d.pos = Some(pos);
            d.direction = facing;
            // Transporters always arrive fully repaired.
            d.repair_fully();
            d.order = Order::TransportIn {
                x: land_x,
                y: land_y,
            };
            d.flight = FlightAction::TransportIn;
            d.flight_started = Some(now);
            d.selected = selected;

            // One flight at a time.
            break;
        }
    }

    // -----------------------------------------------------------------------
    // Transporter entry and exit points
    // -----------------------------------------------------------------------

    /// Set where reinforcement flights enter the live map, clamped inside
    /// the scroll bounds.
    pub fn set_transporter_entry(&mut self, player: Player, x: u32, y: u32) {
        debug_assert!(player.is_valid());
        if !player.is_valid() {
            return;
        }
        self.mission.transporter_entry[player.index()] =
            clamp_entry_tile(TilePos::new(x, y), &self.world.scroll);
    }

    /// Set where departing flights leave the live map, clamped inside the
    /// scroll bounds.
    pub fn set_transporter_exit(&mut self, player: Player, x: u32, y: u32) {
        debug_assert!(player.is_valid());
        if !player.is_valid() {
            return;
        }
        self.mission.transporter_exit[player.index()] =
            clamp_entry_tile(TilePos::new(x, y), &self.world.scroll);
    }

    /// Entry point in world coordinates.
    pub fn transporter_entry(&self, player: Player) -> (u32, u32) {
        let t = self.mission.transporter_entry[player.index()];
        (world_coord(t.x), world_coord(t.y))
    }

    /// Exit point in world coordinates.
    pub fn transporter_exit(&self, player: Player) -> (u32, u32) {
        let t = self.mission.transporter_exit[player.index()];
        (world_coord(t.x), world_coord(t.y))
    }

    /// Set or clear the move-to-safety mode used at campaign boundaries.
    pub fn set_droids_to_safety(&mut self, set: bool) {
        self.mission.droids_to_safety = set;
    }

    pub fn droids_to_safety(&self) -> bool {
        self.mission.droids_to_safety
    }

    pub fn set_campaign_number(&mut self, number: u32) {
        self.mission.campaign_number = number;
    }

    pub fn campaign_number(&self) -> u32 {
        self.mission.campaign_number
    }
}

// ===========================================================================
// Tests
// ===========================================================================
