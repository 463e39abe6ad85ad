//! Input command queue for externally-submitted state mutations.
//!
//! Commands come from the UI, scripting, or the network layer. Dispatch mode
//! is an explicit parameter on every submission: `Immediate` applies
//! synchronously and is only legal for player-private or offline flows;
//! `Queued` serializes the command so every peer applies it identically, in
//! delivery order, at the next tick boundary. Submitting a sync-required
//! command immediately in a networked session is refused — it would
//! desynchronize peers.

use crate::droid::Order;
use crate::id::{DroidId, Player};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dispatch mode
// ---------------------------------------------------------------------------

/// How a state-mutating request is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Applied synchronously, now. Offline/local flows only.
    Immediate,
    /// Serialized onto the queue; applied in delivery order at the next
    /// tick boundary, identically on every peer.
    Queued,
}

/// Errors from command submission.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command must use queued dispatch in a networked session")]
    RequiresQueuedDispatch,
}

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single command that can be submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Board a droid onto a transporter.
    LoadDroid {
        transporter: DroidId,
        droid: DroidId,
    },
    /// Disembark one droid near the given world position.
    UnloadDroid {
        transporter: DroidId,
        droid: DroidId,
        x: u32,
        y: u32,
    },
    /// Send a transporter on its way (out from home, or in as
    /// reinforcements when off-world).
    LaunchTransporter { transporter: DroidId },
    /// Give a droid a standing order.
    OrderDroid { droid: DroidId, order: Order },
    /// Place a landing / no-go zone rectangle.
    SetLandingZone {
        area: usize,
        x1: u8,
        y1: u8,
        x2: u8,
        y2: u8,
    },
    /// Set where reinforcement flights enter the live map.
    SetTransporterEntry { player: Player, x: u32, y: u32 },
    /// Set where departing flights leave the live map.
    SetTransporterExit { player: Player, x: u32, y: u32 },
    /// Release held transporters toward the landing zone.
    FlyTransportersIn { player: Player, track: bool },
}

impl Command {
    /// Whether this command mutates shared, synchronized game state and so
    /// must be queued in a networked session. Mission-transition consequences
    /// (zones, entry points, fly-in) are performed identically by every peer
    /// as a result of an already-synchronized event, so they may be applied
    /// immediately.
    pub fn requires_sync(&self) -> bool {
        matches!(
            self,
            Command::LoadDroid { .. }
                | Command::UnloadDroid { .. }
                | Command::LaunchTransporter { .. }
                | Command::OrderDroid { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// A queue of commands waiting to be applied at the next tick boundary.
///
/// Supports optional history tracking for replay and desync debugging.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    /// Commands waiting to be applied, in delivery order.
    pending: Vec<Command>,
    /// History of applied commands: (tick, command).
    history: Vec<(u64, Command)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    /// Create a new empty command queue with no history tracking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue that retains up to `max_history` applied commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: Vec::new(),
            max_history,
        }
    }

    /// Push a single command onto the queue.
    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Push multiple commands at once, preserving order.
    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands, moving them to history with the given
    /// tick. Returns the drained commands in delivery order.
    pub fn drain(&mut self, tick: u64) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            for cmd in &commands {
                self.history.push((tick, cmd.clone()));
            }
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Number of commands waiting to be applied.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applied-command history as (tick, command) pairs.
    pub fn history(&self) -> &[(u64, Command)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
