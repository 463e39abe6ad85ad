//! Simulation time and state-hash types.
//!
//! Time is tick-counted: one call to [`engine::Engine::step`] advances the
//! simulation by one tick. All mission timers and transporter schedules are
//! expressed in ticks relative to the running tick counter, so they pause
//! when the simulation pauses and stay identical across networked peers.
//!
//! [`engine::Engine::step`]: crate::engine::Engine::step

use serde::{Deserialize, Serialize};

/// Simulation tick count. One tick = one `step()` call.
pub type Ticks = u64;

/// Ticks per wall-clock second at the nominal update rate.
pub const GAME_TICKS_PER_SEC: Ticks = 60;

/// One minute of game time, in ticks.
pub const ONE_MINUTE: Ticks = 60 * GAME_TICKS_PER_SEC;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u32 into the hash.
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a bool into the hash.
    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
