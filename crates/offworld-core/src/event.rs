//! Typed event system with pre-allocated ring buffers.
//!
//! Mission transitions and transporter flights notify collaborators (UI,
//! audio, scripting) through fire-and-forget events. Events are recorded as
//! they happen and drained by the embedding game after each tick; this
//! subsystem owns no state about what listeners do with them.
//!
//! Event types can be suppressed via [`EventBus::suppress`], which prevents
//! any recording for that type. Suppressed events have zero cost.

use crate::id::{DroidId, Player};
use crate::sim::Ticks;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // -- Transporter flights --
    TransporterLaunched {
        transporter: DroidId,
        player: Player,
        tick: Ticks,
    },
    /// A waiting reinforcement transporter has been released to fly in.
    TransporterArrived {
        transporter: DroidId,
        player: Player,
        tick: Ticks,
    },
    /// Touchdown on the landing zone; passengers are about to disembark.
    ReinforcementsLanded {
        transporter: DroidId,
        player: Player,
        tick: Ticks,
    },
    /// All passengers have disembarked.
    TransporterLanded {
        transporter: DroidId,
        player: Player,
        tick: Ticks,
    },
    /// A transporter left the live map for the held list.
    TransporterOffMap {
        transporter: DroidId,
        player: Player,
        tick: Ticks,
    },
    /// The next load would exactly fill the transporter: UI cue.
    TransporterFull {
        transporter: DroidId,
        tick: Ticks,
    },
    /// The held list contains nothing left to fly in.
    NoReinforcementsLeft {
        player: Player,
        tick: Ticks,
    },

    // -- Mission timers --
    MissionTimersArmed {
        tick: Ticks,
    },
    MissionTimerActivated {
        tick: Ticks,
    },
    CountdownMilestone {
        minutes: u8,
        tick: Ticks,
    },
    MissionTimeout {
        tick: Ticks,
    },

    // -- Lifecycle --
    /// Every unit has been flown to safety; the next level may begin.
    StartNextLevel {
        tick: Ticks,
    },
    /// Intelligence messages cleared at a campaign boundary.
    IntelligenceCleared {
        tick: Ticks,
    },
    /// A droid was destroyed without combat (placement failure, cleanup).
    DroidVanished {
        droid: DroidId,
        player: Player,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    TransporterLaunched,
    TransporterArrived,
    ReinforcementsLanded,
    TransporterLanded,
    TransporterOffMap,
    TransporterFull,
    NoReinforcementsLeft,
    MissionTimersArmed,
    MissionTimerActivated,
    CountdownMilestone,
    MissionTimeout,
    StartNextLevel,
    IntelligenceCleared,
    DroidVanished,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 14;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TransporterLaunched { .. } => EventKind::TransporterLaunched,
            Event::TransporterArrived { .. } => EventKind::TransporterArrived,
            Event::ReinforcementsLanded { .. } => EventKind::ReinforcementsLanded,
            Event::TransporterLanded { .. } => EventKind::TransporterLanded,
            Event::TransporterOffMap { .. } => EventKind::TransporterOffMap,
            Event::TransporterFull { .. } => EventKind::TransporterFull,
            Event::NoReinforcementsLeft { .. } => EventKind::NoReinforcementsLeft,
            Event::MissionTimersArmed { .. } => EventKind::MissionTimersArmed,
            Event::MissionTimerActivated { .. } => EventKind::MissionTimerActivated,
            Event::CountdownMilestone { .. } => EventKind::CountdownMilestone,
            Event::MissionTimeout { .. } => EventKind::MissionTimeout,
            Event::StartNextLevel { .. } => EventKind::StartNextLevel,
            Event::IntelligenceCleared { .. } => EventKind::IntelligenceCleared,
            Event::DroidVanished { .. } => EventKind::DroidVanished,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }

    fn all() -> [EventKind; EVENT_KIND_COUNT] {
        [
            EventKind::TransporterLaunched,
            EventKind::TransporterArrived,
            EventKind::ReinforcementsLanded,
            EventKind::TransporterLanded,
            EventKind::TransporterOffMap,
            EventKind::TransporterFull,
            EventKind::NoReinforcementsLeft,
            EventKind::MissionTimersArmed,
            EventKind::MissionTimerActivated,
            EventKind::CountdownMilestone,
            EventKind::MissionTimeout,
            EventKind::StartNextLevel,
            EventKind::IntelligenceCleared,
            EventKind::DroidVanished,
        ]
    }
}

// ---------------------------------------------------------------------------
// EventBuffer — pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A ring buffer for one event kind. Fixed capacity; when full, the oldest
/// events are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored.
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        let capacity = self.events.len();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.total_written += 1;
    }

    /// Events in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let capacity = self.events.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).filter_map(move |i| self.events[(start + i) % capacity].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drain all buffered events, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        let out: Vec<Event> = self.iter().cloned().collect();
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
        out
    }

    /// Total events ever written, including any dropped by wraparound.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default per-kind ring capacity.
const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// One ring buffer per event kind, with per-kind suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBus {
    buffers: Vec<EventBuffer>,
    suppressed: Vec<bool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus with the given per-kind ring capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: (0..EVENT_KIND_COUNT)
                .map(|_| EventBuffer::new(capacity))
                .collect(),
            suppressed: vec![false; EVENT_KIND_COUNT],
        }
    }

    /// Record an event unless its kind is suppressed.
    pub fn publish(&mut self, event: Event) {
        let kind = event.kind();
        if self.suppressed[kind.index()] {
            return;
        }
        self.buffers[kind.index()].push(event);
    }

    /// Suppress a kind: subsequent publishes of it are dropped for free.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    /// Re-enable a suppressed kind.
    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    /// Buffered events of one kind, oldest first.
    pub fn events_of(&self, kind: EventKind) -> Vec<Event> {
        self.buffers[kind.index()].iter().cloned().collect()
    }

    /// Drain every buffer, returning all events grouped by kind order.
    pub fn drain_all(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        for kind in EventKind::all() {
            out.extend(self.buffers[kind.index()].drain());
        }
        out
    }

    /// Number of buffered events across all kinds.
    pub fn pending(&self) -> usize {
        self.buffers.iter().map(|b| b.len()).sum()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
