//! Structures, features, and flag positions: the immobile entities a world
//! state owns.
//!
//! Mission transitions touch these in only a few ways: in-progress builds
//! are force-completed when the player departs for an off-world mission,
//! factories and labs are put on hold across a limbo boundary, and repair
//! facilities gate the free end-of-mission repair. Everything else about
//! structures belongs to external collaborators.

use crate::id::Player;
use crate::map::{TilePos, WorldPos};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Function-specific structure state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    Factory {
        /// Delivery point for freshly built droids, if designated.
        assembly_point: Option<TilePos>,
        /// Production suspended (set across limbo boundaries).
        on_hold: bool,
    },
    Research {
        /// Research suspended (set across limbo boundaries).
        on_hold: bool,
    },
    RepairFacility,
    Hq,
    PowerGenerator,
    ResourceExtractor,
    SensorTower,
    Generic,
}

/// Build progress of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    BeingBuilt { progress: u32, required: u32 },
    Built,
}

/// A single structure. Identity is the arena key; this is the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub player: Player,
    pub name: String,
    pub kind: StructureKind,
    pub status: BuildStatus,
    pub pos: WorldPos,
}

impl Structure {
    pub fn new(player: Player, kind: StructureKind, name: impl Into<String>, pos: WorldPos) -> Self {
        Self {
            player,
            name: name.into(),
            kind,
            status: BuildStatus::Built,
            pos,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.kind, StructureKind::Factory { .. })
    }

    pub fn is_built(&self) -> bool {
        matches!(self.status, BuildStatus::Built)
    }

    /// Grant all remaining build points. No-op on a completed structure.
    pub fn complete_build(&mut self) {
        self.status = BuildStatus::Built;
    }

    /// Suspend factory production or lab research. No-op for other kinds.
    pub fn hold_work(&mut self) {
        match &mut self.kind {
            StructureKind::Factory { on_hold, .. } => *on_hold = true,
            StructureKind::Research { on_hold } => *on_hold = true,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Neutral map furniture: scenery, wrecks, oil resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub pos: WorldPos,
    /// Oil resources are indexed separately by the world state.
    pub is_oil_resource: bool,
}

// ---------------------------------------------------------------------------
// Flag positions
// ---------------------------------------------------------------------------

/// A delivery-point flag. Owned by value in the per-player world lists;
/// nothing references flags across collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagPosition {
    pub player: Player,
    pub pos: TilePos,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_build_finishes_structure() {
        let mut s = Structure::new(
            Player(0),
            StructureKind::Generic,
            "Wall",
            WorldPos::new(256, 256, 0),
        );
        s.status = BuildStatus::BeingBuilt {
            progress: 10,
            required: 100,
        };
        assert!(!s.is_built());
        s.complete_build();
        assert!(s.is_built());
    }

    #[test]
    fn hold_work_only_affects_factories_and_labs() {
        let pos = WorldPos::new(0, 0, 0);
        let mut factory = Structure::new(
            Player(0),
            StructureKind::Factory {
                assembly_point: None,
                on_hold: false,
            },
            "Factory",
            pos,
        );
        factory.hold_work();
        assert!(matches!(
            factory.kind,
            StructureKind::Factory { on_hold: true, .. }
        ));

        let mut hq = Structure::new(Player(0), StructureKind::Hq, "HQ", pos);
        hq.hold_work();
        assert_eq!(hq.kind, StructureKind::Hq);
    }
}
