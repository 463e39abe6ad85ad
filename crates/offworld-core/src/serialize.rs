//! Versioned snapshots of the entire engine state.
//!
//! Everything §3-shaped round-trips: both world states, the mission context
//! (timers, stash, limbo lists), every arena, landing zones, and power —
//! including a transporter saved mid-flight with passengers aboard. The
//! command queue and event buffers are intentionally not part of a
//! snapshot: saves happen between ticks, when the queue has drained and
//! events have been delivered.

use crate::droid::Droid;
use crate::engine::{Engine, GameMode};
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
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x4F57_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header carried by every snapshot. Enables format detection and version
/// checking before trusting the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    /// Validate the header. Returns `Ok(())` if this build can decode it.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Serializable engine state
// ---------------------------------------------------------------------------

/// The serializable portion of the engine. Excludes the event bus and the
/// command queue (both empty between ticks).
#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    droids: SlotMap<DroidId, Droid>,
    structures: SlotMap<StructureId, Structure>,
    features: SlotMap<FeatureId, Feature>,
    groups: SlotMap<GroupId, Group>,
    world: WorldState,
    mission: MissionContext,
    landing_zones: LandingZones,
    power: [u32; MAX_PLAYERS],
    sim_state: SimState,
    mode: GameMode,
    selected_player: Player,
    last_state_hash: u64,
}

impl Engine {
    /// Serialize the whole engine state into a versioned snapshot.
    pub fn save_snapshot(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            droids: self.droids.clone(),
            structures: self.structures.clone(),
            features: self.features.clone(),
            groups: self.groups.clone(),
            world: self.world.clone(),
            mission: self.mission.clone(),
            landing_zones: self.landing_zones.clone(),
            power: self.power,
            sim_state: self.sim_state.clone(),
            mode: self.mode,
            selected_player: self.selected_player,
            last_state_hash: self.last_state_hash,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild an engine from snapshot bytes.
    pub fn load_snapshot(data: &[u8]) -> Result<Engine, DeserializeError> {
        let snapshot: EngineSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let mut engine = Engine::new(snapshot.mode);
        engine.droids = snapshot.droids;
        engine.structures = snapshot.structures;
        engine.features = snapshot.features;
        engine.groups = snapshot.groups;
        engine.world = snapshot.world;
        engine.mission = snapshot.mission;
        engine.landing_zones = snapshot.landing_zones;
        engine.power = snapshot.power;
        engine.sim_state = snapshot.sim_state;
        engine.selected_player = snapshot.selected_player;
        engine.last_state_hash = snapshot.last_state_hash;
        engine.event_bus = EventBus::default();
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Subsystem hashes
    // -----------------------------------------------------------------------

    /// Per-subsystem digests for pinpointing which part of the state
    /// diverged between two peers.
    pub fn subsystem_hashes(&self) -> SubsystemHashes {
        SubsystemHashes {
            droids: hash_encoded(&self.droids),
            structures: hash_encoded(&self.structures),
            world: hash_encoded(&self.world),
            mission: hash_encoded(&self.mission),
            landing_zones: hash_encoded(&self.landing_zones),
            sim_state: hash_encoded(&self.sim_state),
        }
    }
}

/// Per-subsystem state hashes for debugging desyncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemHashes {
    pub droids: u64,
    pub structures: u64,
    pub world: u64,
    pub mission: u64,
    pub landing_zones: u64,
    pub sim_state: u64,
}

fn hash_encoded<T: Serialize>(value: &T) -> u64 {
    let mut h = StateHash::new();
    match bitcode::serialize(value) {
        Ok(bytes) => h.write(&bytes),
        Err(_) => h.write_u64(u64::MAX),
    }
    h.finish()
}

// ===========================================================================
// Tests
// ===========================================================================
