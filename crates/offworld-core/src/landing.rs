//! Landing zones and no-go areas.
//!
//! Each zone is a tile rectangle. Zone 0 is the selected player's landing
//! zone; the last slot is reserved for limbo placement. Zones double as
//! exclusion areas: the disembark tile search refuses tiles inside any set
//! zone so units never land on the pad the transporter needs.

use crate::map::{ScrollBounds, TilePos, world_coord};
use serde::{Deserialize, Serialize};

/// Total landing-zone / no-go-area slots.
pub const MAX_LANDING_ZONES: usize = 8;

/// The slot reserved for the limbo landing area.
pub const LIMBO_LANDING: usize = MAX_LANDING_ZONES - 1;

// ---------------------------------------------------------------------------
// LandingZone
// ---------------------------------------------------------------------------

/// A tile-rectangle zone. All-zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingZone {
    pub x1: u8,
    pub y1: u8,
    pub x2: u8,
    pub y2: u8,
}

impl LandingZone {
    /// Whether this zone has been placed on the map.
    pub fn is_set(&self) -> bool {
        !(self.x1 == 0 && self.y1 == 0 && self.x2 == 0 && self.y2 == 0)
    }

    /// Whether a tile falls inside the zone rectangle (inclusive).
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= self.x1 as u32
            && tile.x <= self.x2 as u32
            && tile.y >= self.y1 as u32
            && tile.y <= self.y2 as u32
    }

    /// Centre tile of the zone: where a transporter touches down.
    pub fn centre(&self) -> TilePos {
        TilePos {
            x: self.x1 as u32 + (self.x2 as u32 - self.x1 as u32) / 2,
            y: self.y1 as u32 + (self.y2 as u32 - self.y1 as u32) / 2,
        }
    }

    /// Centre of the zone in world coordinates.
    pub fn centre_world(&self) -> (u32, u32) {
        let c = self.centre();
        (world_coord(c.x), world_coord(c.y))
    }
}

// ---------------------------------------------------------------------------
// LandingZones
// ---------------------------------------------------------------------------

/// The full zone table for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingZones {
    zones: [LandingZone; MAX_LANDING_ZONES],
}

impl LandingZones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a zone rectangle, normalizing so `x1 <= x2` and `y1 <= y2`.
    pub fn set(&mut self, area: usize, mut x1: u8, mut y1: u8, mut x2: u8, mut y2: u8) {
        debug_assert!(area < MAX_LANDING_ZONES, "landing zone {area} out of range");
        if area >= MAX_LANDING_ZONES {
            log::error!("landing zone {area} out of range, ignoring");
            return;
        }
        if x2 < x1 {
            std::mem::swap(&mut x1, &mut x2);
        }
        if y2 < y1 {
            std::mem::swap(&mut y1, &mut y2);
        }
        self.zones[area] = LandingZone { x1, y1, x2, y2 };
    }

    pub fn get(&self, area: usize) -> &LandingZone {
        &self.zones[area.min(MAX_LANDING_ZONES - 1)]
    }

    /// Clear every zone except the limbo slot, which is placed ahead of the
    /// mission it serves and must survive the reset.
    pub fn reset_no_go_areas(&mut self) {
        for (i, zone) in self.zones.iter_mut().enumerate() {
            if i != LIMBO_LANDING {
                *zone = LandingZone::default();
            }
        }
    }

    /// Clear everything, limbo slot included. Session init only.
    pub fn clear_all(&mut self) {
        self.zones = [LandingZone::default(); MAX_LANDING_ZONES];
    }

    /// Whether a tile lies within any set zone.
    pub fn within_any(&self, tile: TilePos) -> bool {
        self.zones.iter().any(|z| z.is_set() && z.contains(tile))
    }

    /// Landing centre for a zone slot, in world coordinates.
    pub fn landing_position(&self, area: usize) -> (u32, u32) {
        self.get(area).centre_world()
    }
}

/// Clamp a requested entry/exit tile to lie strictly inside the scroll
/// bounds, falling back to just inside the minimum corner when outside.
pub fn clamp_entry_tile(tile: TilePos, scroll: &ScrollBounds) -> TilePos {
    let x = if tile.x > scroll.min_x && tile.x < scroll.max_x {
        tile.x
    } else {
        log::debug!(
            "entry tile x {} outside scroll limits {}..{}",
            tile.x,
            scroll.min_x,
            scroll.max_x
        );
        scroll.min_x + crate::map::EDGE_SIZE
    };
    let y = if tile.y > scroll.min_y && tile.y < scroll.max_y {
        tile.y
    } else {
        log::debug!(
            "entry tile y {} outside scroll limits {}..{}",
            tile.y,
            scroll.min_y,
            scroll.max_y
        );
        scroll.min_y + crate::map::EDGE_SIZE
    };
    TilePos { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_normalizes_corners() {
        let mut zones = LandingZones::new();
        zones.set(0, 10, 12, 6, 8);
        let z = zones.get(0);
        assert_eq!((z.x1, z.y1, z.x2, z.y2), (6, 8, 10, 12));
    }

    #[test]
    fn contains_is_inclusive() {
        let z = LandingZone {
            x1: 4,
            y1: 4,
            x2: 6,
            y2: 6,
        };
        assert!(z.contains(TilePos::new(4, 4)));
        assert!(z.contains(TilePos::new(6, 6)));
        assert!(!z.contains(TilePos::new(7, 6)));
    }

    #[test]
    fn centre_of_zone() {
        let z = LandingZone {
            x1: 4,
            y1: 4,
            x2: 8,
            y2: 6,
        };
        assert_eq!(z.centre(), TilePos::new(6, 5));
    }

    #[test]
    fn reset_preserves_limbo_slot() {
        let mut zones = LandingZones::new();
        zones.set(0, 1, 1, 3, 3);
        zones.set(LIMBO_LANDING, 10, 10, 12, 12);
        zones.reset_no_go_areas();
        assert!(!zones.get(0).is_set());
        assert!(zones.get(LIMBO_LANDING).is_set());
    }

    #[test]
    fn within_any_ignores_unset_zones() {
        let mut zones = LandingZones::new();
        assert!(!zones.within_any(TilePos::new(0, 0)));
        zones.set(1, 2, 2, 4, 4);
        assert!(zones.within_any(TilePos::new(3, 3)));
        assert!(!zones.within_any(TilePos::new(5, 5)));
    }

    #[test]
    fn clamp_entry_tile_rejects_out_of_bounds() {
        let scroll = ScrollBounds::new(0, 0, 20, 20);
        let inside = clamp_entry_tile(TilePos::new(5, 7), &scroll);
        assert_eq!(inside, TilePos::new(5, 7));

        let outside = clamp_entry_tile(TilePos::new(25, 7), &scroll);
        assert_eq!(outside.x, crate::map::EDGE_SIZE);
        assert_eq!(outside.y, 7);
    }
}
