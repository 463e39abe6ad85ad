//! Droid records: the mobile units that mission transitions shuffle between
//! worlds, limbo, and transporter cargo holds.
//!
//! A droid's data lives in the engine's droid arena for its whole life; which
//! collection *owns* it (a live world list, the stashed world list, a limbo
//! list, or a transporter's cargo group) changes as missions start and end.
//! Position is `Option<WorldPos>`: `None` is the unplaced sentinel carried by
//! droids that are off every map (in limbo, in cargo, or held between
//! campaigns).

use crate::id::{GroupId, Player, StructureId};
use crate::map::WorldPos;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What a droid is. Mission transitions only care about a few of these
/// distinctions (transporters, commanders, builders), but keeping the rest
/// lets level data describe a realistic force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DroidKind {
    Weapon,
    Construct,
    Person,
    Cyborg,
    Commander,
    Sensor,
    Transporter,
    SuperTransporter,
}

impl DroidKind {
    /// Transporters of either size share all carrier behavior.
    pub fn is_transporter(self) -> bool {
        matches!(self, DroidKind::Transporter | DroidKind::SuperTransporter)
    }

    /// Builders keep their build orders across mission boundaries.
    pub fn is_builder(self) -> bool {
        matches!(self, DroidKind::Construct)
    }
}

/// Body size class. Determines cargo space taken in multiplayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodySize {
    Light,
    Medium,
    Heavy,
    SuperHeavy,
}

impl BodySize {
    /// Cargo slots occupied by this body class.
    pub fn cargo_slots(self) -> u32 {
        match self {
            BodySize::Light => 1,
            BodySize::Medium => 2,
            BodySize::Heavy => 3,
            BodySize::SuperHeavy => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Orders and flight actions
// ---------------------------------------------------------------------------

/// The current standing order of a droid. Combat and pathfinding execute
/// these; this subsystem only issues, inspects, and clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    None,
    Stop,
    Move {
        x: u32,
        y: u32,
    },
    Build {
        target: StructureId,
    },
    TransportOut {
        x: u32,
        y: u32,
    },
    TransportIn {
        x: u32,
        y: u32,
    },
    TransportReturn {
        x: u32,
        y: u32,
    },
    Disembark {
        x: u32,
        y: u32,
    },
}

/// Flight phase of a transporter. `None` for everything grounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlightAction {
    #[default]
    None,
    /// Leaving the live map toward the mission site or home.
    TransportOut,
    /// Flying reinforcements onto the live map.
    TransportIn,
    /// Holding off-map until the reinforcement schedule releases it.
    WaitToFlyIn,
    /// Flying back empty to pick up another load.
    TransportReturn,
}

// ---------------------------------------------------------------------------
// Droid
// ---------------------------------------------------------------------------

/// A single droid. Identity is the arena key; this is the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Droid {
    pub player: Player,
    pub name: String,
    pub kind: DroidKind,
    pub body_size: BodySize,
    /// `None` while off every map (limbo, cargo, carried between campaigns).
    pub pos: Option<WorldPos>,
    /// Facing, in 1/65536ths of a revolution from north.
    pub direction: u16,
    pub hit_points: u32,
    pub original_hit_points: u32,
    pub order: Order,
    pub flight: FlightAction,
    /// Tick at which the current flight action began.
    pub flight_started: Option<crate::sim::Ticks>,
    /// Group membership: a commander's command group or a transporter's
    /// cargo hold. At most one at a time.
    pub group: Option<GroupId>,
    /// Home structure (rearm pad, repair base). Cleared on map changes.
    pub base: Option<StructureId>,
    pub selected: bool,
}

impl Droid {
    /// Create a full-health droid with no orders and no position.
    pub fn new(player: Player, kind: DroidKind, name: impl Into<String>) -> Self {
        let hit_points = match kind {
            DroidKind::Transporter | DroidKind::SuperTransporter => 500,
            DroidKind::Person => 50,
            _ => 150,
        };
        Self {
            player,
            name: name.into(),
            kind,
            body_size: BodySize::Light,
            pos: None,
            direction: 0,
            hit_points,
            original_hit_points: hit_points,
            order: Order::None,
            flight: FlightAction::None,
            flight_started: None,
            group: None,
            base: None,
            selected: false,
        }
    }

    pub fn with_body_size(mut self, size: BodySize) -> Self {
        self.body_size = size;
        self
    }

    pub fn is_transporter(&self) -> bool {
        self.kind.is_transporter()
    }

    pub fn is_damaged(&self) -> bool {
        self.hit_points < self.original_hit_points
    }

    /// Restore to full hit points.
    pub fn repair_fully(&mut self) {
        self.hit_points = self.original_hit_points;
    }

    /// Drop map-derived state: position, facing, base assignment, selection.
    /// Called whenever a droid leaves a map without landing on another.
    pub fn clear_map_state(&mut self) {
        self.pos = None;
        self.base = None;
        self.selected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_droid_is_unplaced_and_healthy() {
        let d = Droid::new(Player(0), DroidKind::Weapon, "Viper Wheels");
        assert_eq!(d.pos, None);
        assert!(!d.is_damaged());
        assert_eq!(d.order, Order::None);
        assert_eq!(d.flight, FlightAction::None);
    }

    #[test]
    fn transporter_kinds() {
        assert!(DroidKind::Transporter.is_transporter());
        assert!(DroidKind::SuperTransporter.is_transporter());
        assert!(!DroidKind::Commander.is_transporter());
    }

    #[test]
    fn repair_restores_full_health() {
        let mut d = Droid::new(Player(1), DroidKind::Weapon, "Scout");
        d.hit_points = 10;
        assert!(d.is_damaged());
        d.repair_fully();
        assert!(!d.is_damaged());
    }

    #[test]
    fn clear_map_state_drops_position() {
        let mut d = Droid::new(Player(0), DroidKind::Weapon, "Scout");
        d.pos = Some(crate::map::WorldPos::new(640, 640, 0));
        d.selected = true;
        d.clear_map_state();
        assert_eq!(d.pos, None);
        assert!(!d.selected);
    }

    #[test]
    fn cargo_slots_scale_with_body() {
        assert_eq!(BodySize::Light.cargo_slots(), 1);
        assert_eq!(BodySize::SuperHeavy.cargo_slots(), 4);
    }
}
