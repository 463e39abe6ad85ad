//! Offworld Core -- campaign mission lifecycle and transporter carriage for
//! a real-time strategy simulation.
//!
//! This crate owns the machinery that lets a force leave one persistent
//! world (the home base), fight on a temporary one (an off-world mission
//! map), and come back, while a capacity-bounded transporter ferries units
//! between the two and the simulation stays deterministic across networked
//! peers.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one tick
//! through the following phases:
//!
//! 1. **Commands** -- drain the queue, applying requests in delivery order.
//! 2. **Flights** -- advance live transporter flight legs.
//! 3. **Held list** -- home-side bookkeeping while off-world.
//! 4. **Timers** -- mission countdown and reinforcement schedule.
//! 5. **Bookkeeping** -- tick counter and deterministic state hash.
//!
//! # World-State Pair
//!
//! Exactly one [`world::WorldState`] is live; the other rests in the mission
//! context. Capture/restore bracket an off-world trip, and a wholesale swap
//! lets placement code measure against the *other* map:
//!
//! ```rust,ignore
//! engine.capture_world_into_stash();      // departing: home goes cold
//! engine.apply_level(&level, ObjectPolicy::ClearObjects);
//! // ... the mission runs ...
//! engine.restore_world_from_stash();      // returning: home is live again
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- arenas, the live world, and the tick pipeline.
//! - [`mission::MissionContext`] -- mission type, timers, the stashed world,
//!   and the limbo lists.
//! - [`mission::MissionType`] -- the lifecycle state machine, with one
//!   behavior record per type.
//! - [`command::DispatchMode`] -- explicit `Immediate` vs `Queued` dispatch
//!   on every state-mutating call.
//! - [`transporter::TRANSPORTER_CAPACITY`] -- the cargo bound enforced on
//!   every boarding.
//! - [`serialize`] -- versioned snapshots via bitcode; a game saved with a
//!   transporter mid-flight restores mid-flight.

pub mod command;
pub mod droid;
pub mod engine;
pub mod event;
pub mod group;
pub mod id;
pub mod landing;
pub mod level;
pub mod limbo;
pub mod map;
pub mod mission;
pub mod query;
pub mod serialize;
pub mod sim;
pub mod structure;
pub mod transporter;
pub mod validation;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
