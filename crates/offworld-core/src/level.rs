//! Level data: the static description a mission transition applies.
//!
//! `start_mission` must either complete fully or fail before any world
//! mutation begins, so level application is split into a fallible
//! [`LevelData::validate`] pass (run before any capture or migration) and an
//! infallible [`Engine::apply_level`] pass. The optional JSON loader is
//! gated behind the `level-loader` feature.

use crate::droid::{BodySize, Droid, DroidKind};
use crate::engine::Engine;
use crate::id::{MAX_PLAYERS, Player};
use crate::map::{Gateway, ScrollBounds, TileMap, TilePos, world_coord};
use crate::structure::{Feature, FlagPosition, Structure, StructureKind};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from level validation or parsing.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level '{0}' has an empty map")]
    EmptyMap(String),
    #[error("level '{name}': height table has {got} entries, expected {expected}")]
    HeightTableSize {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("level '{name}': scroll bounds exceed the {width}x{height} map")]
    ScrollOutOfBounds {
        name: String,
        width: u32,
        height: u32,
    },
    #[error("level '{name}': object '{object}' at {x},{y} is off the map")]
    ObjectOffMap {
        name: String,
        object: String,
        x: u32,
        y: u32,
    },
    #[error("level '{name}': player {player} out of range")]
    PlayerOutOfRange { name: String, player: u8 },
    #[cfg(feature = "level-loader")]
    #[error("level JSON malformed: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Object definitions
// ---------------------------------------------------------------------------

/// A droid the level places at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroidDef {
    pub player: u8,
    pub kind: DroidKind,
    #[serde(default = "default_body_size")]
    pub body_size: BodySize,
    pub name: String,
    pub tile: TilePos,
}

fn default_body_size() -> BodySize {
    BodySize::Light
}

/// A structure the level places at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDef {
    pub player: u8,
    pub kind: StructureKind,
    pub name: String,
    pub tile: TilePos,
}

/// A feature the level places at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub tile: TilePos,
    #[serde(default)]
    pub is_oil_resource: bool,
}

// ---------------------------------------------------------------------------
// LevelData
// ---------------------------------------------------------------------------

/// Complete static data for one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Per-tile heights, row-major. Empty means flat terrain.
    #[serde(default)]
    pub heights: Vec<u16>,
    /// Tiles blocked for ground movement.
    #[serde(default)]
    pub blocked_tiles: Vec<TilePos>,
    pub scroll: ScrollBounds,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default)]
    pub droids: Vec<DroidDef>,
    #[serde(default)]
    pub structures: Vec<StructureDef>,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
    #[serde(default)]
    pub flags: Vec<FlagPosition>,
    /// Per-player starting power, applied on clearing loads.
    #[serde(default)]
    pub starting_power: [u32; MAX_PLAYERS],
}

impl LevelData {
    /// A flat, empty level filling the whole map with playable area.
    pub fn flat(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            heights: Vec::new(),
            blocked_tiles: Vec::new(),
            scroll: ScrollBounds::new(0, 0, width.saturating_sub(1), height.saturating_sub(1)),
            gateways: Vec::new(),
            droids: Vec::new(),
            structures: Vec::new(),
            features: Vec::new(),
            flags: Vec::new(),
            starting_power: [0; MAX_PLAYERS],
        }
    }

    /// Check internal consistency. Application after a successful validate
    /// cannot fail.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.width == 0 || self.height == 0 {
            return Err(LevelError::EmptyMap(self.name.clone()));
        }
        let expected = (self.width * self.height) as usize;
        if !self.heights.is_empty() && self.heights.len() != expected {
            return Err(LevelError::HeightTableSize {
                name: self.name.clone(),
                got: self.heights.len(),
                expected,
            });
        }
        if self.scroll.max_x >= self.width || self.scroll.max_y >= self.height {
            return Err(LevelError::ScrollOutOfBounds {
                name: self.name.clone(),
                width: self.width,
                height: self.height,
            });
        }
        let on_map = |t: TilePos| t.x < self.width && t.y < self.height;
        for d in &self.droids {
            if d.player as usize >= MAX_PLAYERS {
                return Err(LevelError::PlayerOutOfRange {
                    name: self.name.clone(),
                    player: d.player,
                });
            }
            if !on_map(d.tile) {
                return Err(LevelError::ObjectOffMap {
                    name: self.name.clone(),
                    object: d.name.clone(),
                    x: d.tile.x,
                    y: d.tile.y,
                });
            }
        }
        for s in &self.structures {
            if s.player as usize >= MAX_PLAYERS {
                return Err(LevelError::PlayerOutOfRange {
                    name: self.name.clone(),
                    player: s.player,
                });
            }
            if !on_map(s.tile) {
                return Err(LevelError::ObjectOffMap {
                    name: self.name.clone(),
                    object: s.name.clone(),
                    x: s.tile.x,
                    y: s.tile.y,
                });
            }
        }
        for f in &self.features {
            if !on_map(f.tile) {
                return Err(LevelError::ObjectOffMap {
                    name: self.name.clone(),
                    object: f.name.clone(),
                    x: f.tile.x,
                    y: f.tile.y,
                });
            }
        }
        Ok(())
    }

    fn build_map(&self) -> TileMap {
        let mut map = TileMap::new(self.width, self.height);
        if !self.heights.is_empty() {
            for y in 0..self.height {
                for x in 0..self.width {
                    let i = (y * self.width + x) as usize;
                    map.set_tile_height(TilePos::new(x, y), self.heights[i]);
                }
            }
        }
        for &t in &self.blocked_tiles {
            map.set_blocked(t, crate::map::MovementClass::Ground, true);
            map.set_blocked(t, crate::map::MovementClass::Hover, true);
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// What a level load does with entities already in the live world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectPolicy {
    /// Destroy everything, then install the level's objects.
    ClearObjects,
    /// Keep existing lists (expand missions) and add the level's objects.
    KeepObjects,
}

impl Engine {
    /// Install a validated level into the live world. Callers must have run
    /// [`LevelData::validate`] first — this pass does not fail.
    pub fn apply_level(&mut self, level: &LevelData, policy: ObjectPolicy) {
        log::debug!("applying level '{}' ({policy:?})", level.name);
        if policy == ObjectPolicy::ClearObjects {
            self.clear_live_world();
            self.power = level.starting_power;
        }

        self.world.map = level.build_map();
        self.world.scroll = level.scroll;
        self.world.gateways = level.gateways.clone();

        for def in &level.structures {
            let player = Player(def.player);
            let pos = def.tile.to_world(self.world.map.tile_height(def.tile) as u32);
            let is_extractor = matches!(def.kind, StructureKind::ResourceExtractor);
            let is_sensor = matches!(def.kind, StructureKind::SensorTower);
            let id = self
                .structures
                .insert(Structure::new(player, def.kind.clone(), &def.name, pos));
            self.world.structures[player].push(id);
            if is_extractor {
                self.world.extractors[player].push(id);
            }
            if is_sensor {
                self.world.sensors.push(id);
            }
        }

        for def in &level.features {
            let pos = def.tile.to_world(self.world.map.tile_height(def.tile) as u32);
            let id = self.features.insert(Feature {
                name: def.name.clone(),
                pos,
                is_oil_resource: def.is_oil_resource,
            });
            // Features are owned by the neutral player-0 list.
            self.world.features[Player(0)].push(id);
            if def.is_oil_resource {
                self.world.oil.push(id);
            }
        }

        for flag in &level.flags {
            self.world.flags[flag.player].push(*flag);
        }

        for def in &level.droids {
            let player = Player(def.player);
            let droid = Droid::new(player, def.kind, &def.name).with_body_size(def.body_size);
            let id = self.create_droid(droid);
            self.set_droid_position(id, world_coord(def.tile.x), world_coord(def.tile.y));
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Parse level data from JSON.
#[cfg(feature = "level-loader")]
pub fn load_level_from_json(json: &str) -> Result<LevelData, LevelError> {
    let level: LevelData =
        serde_json::from_str(json).map_err(|e| LevelError::Parse(e.to_string()))?;
    level.validate()?;
    Ok(level)
}

// ===========================================================================
// Tests
// ===========================================================================
