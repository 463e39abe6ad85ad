//! Tile map, scroll bounds, gateways, and the free-tile search primitive.
//!
//! Coordinates come in two flavors: tile coordinates index the map grid,
//! world coordinates are tile coordinates scaled by [`TILE_UNITS`] and are
//! what droid positions are expressed in. The free-tile ring search here is
//! the single placement primitive shared by landing-zone arrival, limbo
//! materialization, post-mission base placement, and disembarkation.

use serde::{Deserialize, Serialize};

/// World units per map tile.
pub const TILE_UNITS: u32 = 128;

/// Width of the unusable border at the map edge, in tiles.
pub const EDGE_SIZE: u32 = 1;

/// Maximum ring radius explored by the free-tile search before giving up.
pub const MAX_TILE_SEARCH_RADIUS: u32 = 20;

/// Convert a tile coordinate to the world coordinate of its origin corner.
pub fn world_coord(tile: u32) -> u32 {
    tile * TILE_UNITS
}

/// Convert a world coordinate to the tile containing it.
pub fn map_coord(world: u32) -> u32 {
    world / TILE_UNITS
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A position on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: u32,
    pub y: u32,
}

impl TilePos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The world position of this tile's origin corner, at the given height.
    pub fn to_world(self, z: u32) -> WorldPos {
        WorldPos {
            x: world_coord(self.x),
            y: world_coord(self.y),
            z,
        }
    }
}

/// A position in world units. `z` is terrain-relative height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorldPos {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The tile containing this world position.
    pub fn tile(self) -> TilePos {
        TilePos {
            x: map_coord(self.x),
            y: map_coord(self.y),
        }
    }
}

/// Rough compass direction from one point toward another, in 1/65536ths of
/// a revolution with 0 = north (+y). Integer-only so every peer computes an
/// identical orientation; a piecewise-linear octant approximation is enough
/// fidelity for spawn facing.
pub fn direction_to(from: WorldPos, to: WorldPos) -> u16 {
    let dx = to.x as i64 - from.x as i64;
    let dy = to.y as i64 - from.y as i64;
    if dx == 0 && dy == 0 {
        return 0;
    }
    let abs_x = dx.abs();
    let abs_y = dy.abs();
    // Angle from the y axis within the quadrant, 0..=16384.
    let frac = 8192 * abs_x.min(abs_y) / abs_x.max(abs_y);
    let oct = if abs_x <= abs_y { frac } else { 16384 - frac };
    let angle = match (dx >= 0, dy >= 0) {
        (true, true) => oct,
        (true, false) => 32768 - oct,
        (false, false) => 32768 + oct,
        (false, true) => 65536 - oct,
    };
    angle as u16
}

// ---------------------------------------------------------------------------
// Movement classes and blocking
// ---------------------------------------------------------------------------

/// Propulsion classes the blocking map distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementClass {
    /// Wheels, tracks, legs.
    Ground,
    /// Hovercraft: water passable, cliffs not.
    Hover,
    /// VTOLs and transporters: only map borders block.
    Lift,
}

impl MovementClass {
    fn bit(self) -> u8 {
        match self {
            MovementClass::Ground => 1 << 0,
            MovementClass::Hover => 1 << 1,
            MovementClass::Lift => 1 << 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Scroll bounds and gateways
// ---------------------------------------------------------------------------

/// The scrollable (playable) rectangle of the current map, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ScrollBounds {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whether a tile lies strictly inside the bounds.
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x > self.min_x && tile.x < self.max_x && tile.y > self.min_y && tile.y < self.max_y
    }

    /// Midpoint of the bounds, in tiles.
    pub fn mid(&self) -> TilePos {
        TilePos {
            x: (self.min_x + self.max_x) / 2,
            y: (self.min_y + self.max_y) / 2,
        }
    }
}

/// A gateway rectangle used by pathfinding region splits. Opaque here; the
/// world-state pair must carry them across swaps untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

// ---------------------------------------------------------------------------
// TileMap
// ---------------------------------------------------------------------------

/// Terrain data for one world: per-tile heights, the blocking map (one
/// bitmask per tile, bits per [`MovementClass`]) and the auxiliary scratch
/// map. An empty (0x0) map is the state of a world whose terrain has been
/// captured away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    heights: Vec<u16>,
    blocking: Vec<u8>,
    aux: Vec<u8>,
}

impl TileMap {
    /// Create a flat, unblocked map of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            heights: vec![0; n],
            blocking: vec![0; n],
            aux: vec![0; n],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether this map has no terrain (the captured-away state).
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    fn index(&self, tile: TilePos) -> Option<usize> {
        if tile.x < self.width && tile.y < self.height {
            Some((tile.y * self.width + tile.x) as usize)
        } else {
            None
        }
    }

    /// Whether a tile coordinate is on the map at all.
    pub fn on_map(&self, tile: TilePos) -> bool {
        self.index(tile).is_some()
    }

    /// Whether a world coordinate is on the map.
    pub fn world_on_map(&self, pos: WorldPos) -> bool {
        self.on_map(pos.tile())
    }

    /// Whether a tile is within [`EDGE_SIZE`] of the map border.
    pub fn near_edge(&self, tile: TilePos) -> bool {
        tile.x < EDGE_SIZE
            || tile.y < EDGE_SIZE
            || tile.x + EDGE_SIZE >= self.width
            || tile.y + EDGE_SIZE >= self.height
    }

    /// Terrain height at a tile (0 off-map).
    pub fn tile_height(&self, tile: TilePos) -> u16 {
        self.index(tile).map(|i| self.heights[i]).unwrap_or(0)
    }

    pub fn set_tile_height(&mut self, tile: TilePos, h: u16) {
        if let Some(i) = self.index(tile) {
            self.heights[i] = h;
        }
    }

    /// Whether a tile blocks the given movement class. Off-map blocks all.
    pub fn blocked(&self, tile: TilePos, class: MovementClass) -> bool {
        match self.index(tile) {
            Some(i) => self.blocking[i] & class.bit() != 0,
            None => true,
        }
    }

    pub fn set_blocked(&mut self, tile: TilePos, class: MovementClass, blocked: bool) {
        if let Some(i) = self.index(tile) {
            if blocked {
                self.blocking[i] |= class.bit();
            } else {
                self.blocking[i] &= !class.bit();
            }
        }
    }

    /// Read the auxiliary bits for a tile (0 off-map).
    pub fn aux_bits(&self, tile: TilePos) -> u8 {
        self.index(tile).map(|i| self.aux[i]).unwrap_or(0)
    }

    pub fn set_aux_bits(&mut self, tile: TilePos, bits: u8) {
        if let Some(i) = self.index(tile) {
            self.aux[i] = bits;
        }
    }

    // -----------------------------------------------------------------------
    // Free-tile search
    // -----------------------------------------------------------------------

    /// Find the closest acceptable tile to `start`, expanding a square ring
    /// outward one radius at a time up to [`MAX_TILE_SEARCH_RADIUS`].
    ///
    /// `accept` decides suitability; callers compose blocking, occupancy,
    /// and zone checks into it. Scan order within a ring is deterministic
    /// (row-major over the ring), which keeps placement identical across
    /// peers.
    pub fn pick_free_tile<F>(&self, start: TilePos, accept: F) -> Option<TilePos>
    where
        F: Fn(TilePos) -> bool,
    {
        if self.is_empty() {
            return None;
        }
        for radius in 0..=MAX_TILE_SEARCH_RADIUS {
            let r = radius as i64;
            for dy in -r..=r {
                for dx in -r..=r {
                    // Only the perimeter of the ring; inner tiles were
                    // covered at smaller radii.
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let x = start.x as i64 + dx;
                    let y = start.y as i64 + dy;
                    if x < 0 || y < 0 {
                        continue;
                    }
                    let tile = TilePos::new(x as u32, y as u32);
                    if self.on_map(tile) && accept(tile) {
                        return Some(tile);
                    }
                }
            }
        }
        None
    }

    /// Pick the map-edge point nearest to `pos`, one tile in from the
    /// scroll border. Used as the spawn/exit point for flights that enter
    /// or leave the world.
    pub fn nearest_edge(&self, pos: WorldPos, scroll: &ScrollBounds) -> WorldPos {
        let mid = scroll.mid();
        let tile = pos.tile();
        let x = if tile.x < mid.x {
            world_coord(scroll.min_x) + EDGE_SIZE * TILE_UNITS
        } else {
            world_coord(scroll.max_x).saturating_sub(EDGE_SIZE * TILE_UNITS)
        };
        let y = if tile.y < mid.y {
            world_coord(scroll.min_y) + EDGE_SIZE * TILE_UNITS
        } else {
            world_coord(scroll.max_y).saturating_sub(EDGE_SIZE * TILE_UNITS)
        };
        let z = self.tile_height(TilePos::new(map_coord(x), map_coord(y))) as u32;
        WorldPos::new(x, y, z)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
