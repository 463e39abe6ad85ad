//! The simulation engine: owns the arenas, the live world, the mission
//! context, and orchestrates the per-tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - Entity arenas ([`Droid`], [`Structure`], [`Feature`], [`Group`]) —
//!   payload storage with generation-checked keys, so a stale id from a
//!   destroyed entity can never alias a new one.
//! - The live [`WorldState`] and the [`MissionContext`] (which holds the
//!   stashed world and the limbo lists).
//! - The [`LandingZones`] table, per-player power, the [`CommandQueue`],
//!   and the [`EventBus`].
//!
//! # Tick pipeline
//!
//! Each `step()` runs, in order:
//! 1. **Commands** — drain the queue and apply in delivery order.
//! 2. **Flights** — advance live transporter flight legs, per-player list
//!    order, iterating a snapshot of ids so removal mid-walk is safe.
//! 3. **Held list** — the home-side update for off-world missions (held
//!    transporters carry no map position).
//! 4. **Timers** — mission countdown and reinforcement schedule.
//! 5. **Bookkeeping** — tick counter and state hash.
//!
//! Everything is single-threaded and cooperative: one step runs to
//! completion before anything else observes the state.

use crate::command::{Command, CommandError, CommandQueue, DispatchMode};
use crate::droid::{Droid, FlightAction};
use crate::event::EventBus;
use crate::group::Group;
use crate::id::{DroidId, FeatureId, GroupId, MAX_PLAYERS, Player, StructureId};
use crate::landing::LandingZones;
use crate::mission::MissionContext;
use crate::sim::{SimState, StateHash};
use crate::structure::{Feature, Structure};
use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Game mode
// ---------------------------------------------------------------------------

/// Session kind. Decides cargo-space accounting and which dispatch modes
/// are legal for shared-state mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Single-player campaign: immediate dispatch is fine everywhere.
    Campaign,
    /// Networked session: shared-state mutations must be queued.
    Multiplayer,
}

/// Result of a single `step()` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Commands drained and applied this step.
    pub commands_applied: usize,
    /// Transporter flight legs that completed this step.
    pub flights_completed: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The core simulation engine for mission lifecycle and transporter
/// carriage.
#[derive(Debug)]
pub struct Engine {
    // -- Entity arenas --
    pub droids: SlotMap<DroidId, Droid>,
    pub structures: SlotMap<StructureId, Structure>,
    pub features: SlotMap<FeatureId, Feature>,
    pub groups: SlotMap<GroupId, Group>,

    /// The live world. The other world sits in `mission.stash`.
    pub world: WorldState,
    pub mission: MissionContext,

    pub landing_zones: LandingZones,
    /// Per-player power pools.
    pub power: [u32; MAX_PLAYERS],

    pub command_queue: CommandQueue,
    pub event_bus: EventBus,
    pub sim_state: SimState,

    pub(crate) mode: GameMode,
    pub selected_player: Player,
    paused: bool,
    pub(crate) last_state_hash: u64,
}

impl Engine {
    /// Create an engine with an empty world and no mission running.
    pub fn new(mode: GameMode) -> Self {
        Self {
            droids: SlotMap::with_key(),
            structures: SlotMap::with_key(),
            features: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            world: WorldState::new(),
            mission: MissionContext::new(),
            landing_zones: LandingZones::new(),
            power: [0; MAX_PLAYERS],
            command_queue: CommandQueue::new(),
            event_bus: EventBus::default(),
            sim_state: SimState::new(),
            mode,
            selected_player: Player(0),
            paused: false,
            last_state_hash: 0,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Pause or resume the simulation. Timers are tick-counted, so they
    /// freeze with it.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The hash computed at the end of the most recent step.
    pub fn last_state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Command submission
    // -----------------------------------------------------------------------

    /// Submit a state-mutating request. Dispatch mode is part of the call:
    /// `Immediate` applies now (refused for sync-required commands in a
    /// networked session — that would desynchronize peers), `Queued` defers
    /// to the next tick boundary in delivery order.
    pub fn submit(&mut self, command: Command, mode: DispatchMode) -> Result<(), CommandError> {
        match mode {
            DispatchMode::Immediate => {
                if self.mode == GameMode::Multiplayer && command.requires_sync() {
                    log::error!(
                        "immediate dispatch of {command:?} refused in a networked session"
                    );
                    return Err(CommandError::RequiresQueuedDispatch);
                }
                self.apply_command(command);
                Ok(())
            }
            DispatchMode::Queued => {
                if let Command::UnloadDroid { droid, .. } = command {
                    // The UI treats the droid as already removed so the
                    // player cannot interact with it twice while the
                    // request is in flight.
                    if let Some(d) = self.droids.get_mut(droid) {
                        d.selected = true;
                    }
                }
                self.command_queue.push(command);
                Ok(())
            }
        }
    }

    /// Apply one delivered command. Delivered commands have no sender to
    /// report to; failures are logged and dropped.
    pub(crate) fn apply_command(&mut self, command: Command) {
        let outcome: Result<(), String> = match command {
            Command::LoadDroid { transporter, droid } => self
                .load_droid(transporter, droid)
                .map_err(|e| e.to_string()),
            Command::UnloadDroid {
                transporter,
                droid,
                x,
                y,
            } => self
                .unload_droid(transporter, droid, x, y)
                .map_err(|e| e.to_string()),
            Command::LaunchTransporter { transporter } => self
                .launch_transporter(transporter)
                .map_err(|e| e.to_string()),
            Command::OrderDroid { droid, order } => match self.droids.get_mut(droid) {
                Some(d) => {
                    d.order = order;
                    Ok(())
                }
                None => Err(format!("order for unknown droid {droid:?}")),
            },
            Command::SetLandingZone {
                area,
                x1,
                y1,
                x2,
                y2,
            } => {
                self.landing_zones.set(area, x1, y1, x2, y2);
                Ok(())
            }
            Command::SetTransporterEntry { player, x, y } => {
                self.set_transporter_entry(player, x, y);
                Ok(())
            }
            Command::SetTransporterExit { player, x, y } => {
                self.set_transporter_exit(player, x, y);
                Ok(())
            }
            Command::FlyTransportersIn { player, track } => {
                self.fly_transporters_in(player, track);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            log::warn!("delivered command failed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Advance the simulation by one tick.
    pub fn step(&mut self) -> StepResult {
        if self.paused {
            return StepResult::default();
        }
        let mut result = StepResult::default();

        // Phase 1: apply queued commands in delivery order.
        let commands = self.command_queue.drain(self.sim_state.tick);
        result.commands_applied = commands.len();
        for command in commands {
            self.apply_command(command);
        }

        // Phase 2: advance live transporter flights. Per-player list order;
        // iterate a snapshot so mid-walk removals cannot corrupt the pass.
        for player in Player::all() {
            for id in self.world.droids[player].clone() {
                let Some(d) = self.droids.get(id) else {
                    continue;
                };
                if !d.is_transporter() || d.flight == FlightAction::None {
                    continue;
                }
                if self.update_transporter(id) {
                    result.flights_completed += 1;
                }
            }
        }

        // Phase 3: home-side update. Held transporters never carry a map
        // position; anything else in the held lists sleeps.
        for player in Player::all() {
            for id in self.mission.stash.droids[player].clone() {
                let Some(d) = self.droids.get_mut(id) else {
                    continue;
                };
                if d.is_transporter() {
                    d.pos = None;
                }
            }
        }

        // Phase 4: timers.
        self.update_mission_timers();
        self.update_reinforcements();

        // Phase 5: bookkeeping.
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
        result
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Deterministic digest of the ownership-relevant state, for desync
    /// detection between peers.
    pub fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);

        let hash_lists = |h: &mut StateHash, world: &WorldState| {
            for (_, list) in world.droids.iter() {
                h.write_u64(list.len() as u64);
                for &id in list {
                    let Some(d) = self.droids.get(id) else {
                        continue;
                    };
                    h.write_u32(d.player.0 as u32);
                    match d.pos {
                        Some(p) => {
                            h.write_u32(p.x);
                            h.write_u32(p.y);
                        }
                        None => h.write_u32(u32::MAX),
                    }
                    h.write_u32(d.hit_points);
                }
            }
        };
        hash_lists(&mut h, &self.world);
        hash_lists(&mut h, &self.mission.stash);

        h.write_bool(self.mission.stash_in_use);
        for (_, list) in self.mission.limbo.iter() {
            h.write_u64(list.len() as u64);
        }
        for p in self.power {
            h.write_u32(p);
        }
        h.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
