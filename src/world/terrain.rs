use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::config::world_seed::WorldSeed;
use crate::world::biome::{self, BiomeType};
use crate::world::geohash::{GeohashError, col_row_to_geohash, grid_size};
use crate::world::topology::{HeightTile, TILE_PRECISION, tile_position};

/// Prefix reserved as always-ice, always-walkable ground.
const ICE_PREFIX: &str = "h9";

#[derive(Debug)]
pub enum TerrainError {
    Geohash(GeohashError),
    TileLoad { path: PathBuf, error: String },
    UnknownContinent(String),
}

impl std::fmt::Display for TerrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerrainError::Geohash(e) => write!(f, "{}", e),
            TerrainError::TileLoad { path, error } => {
                write!(f, "cannot load height tile {}: {}", path.display(), error)
            }
            TerrainError::UnknownContinent(g) => {
                write!(f, "world seed has no continent for geohash '{}'", g)
            }
        }
    }
}

impl std::error::Error for TerrainError {}

impl From<GeohashError> for TerrainError {
    fn from(e: GeohashError) -> Self {
        TerrainError::Geohash(e)
    }
}

/// Procedural terrain: heights from image tiles, biomes from the world seed.
///
/// Every value is a pure function of the geohash, so the caches only memoise.
pub struct TerrainField {
    seed: WorldSeed,
    topology_dir: PathBuf,
    unit_precision: usize,
    height_cache_limit: usize,
    tiles: RwLock<HashMap<String, Arc<HeightTile>>>,
    heights: Mutex<HashMap<String, f64>>,
}

impl TerrainField {
    pub fn new(
        seed: WorldSeed,
        topology_dir: impl Into<PathBuf>,
        unit_precision: usize,
        height_cache_limit: usize,
    ) -> Self {
        TerrainField {
            seed,
            topology_dir: topology_dir.into(),
            unit_precision,
            height_cache_limit: height_cache_limit.max(1),
            tiles: RwLock::new(HashMap::new()),
            heights: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self) -> &WorldSeed {
        &self.seed
    }

    pub fn unit_precision(&self) -> usize {
        self.unit_precision
    }

    /// Register a tile directly instead of loading `<tile>.png`.
    pub fn insert_tile(&self, name: &str, tile: HeightTile) {
        let mut tiles = self.tiles.write().unwrap_or_else(|e| e.into_inner());
        tiles.insert(name.to_string(), Arc::new(tile));
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn cached_heights(&self) -> usize {
        self.heights.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The height tile named `name`, loading and caching it on first use.
    pub fn tile(&self, name: &str) -> Result<Arc<HeightTile>, TerrainError> {
        if let Some(tile) = self
            .tiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(Arc::clone(tile));
        }

        let path = self.topology_dir.join(format!("{}.png", name));
        let tile = HeightTile::from_png(&path).map_err(|e| TerrainError::TileLoad {
            path: path.clone(),
            error: e.to_string(),
        })?;
        info!(
            tile = name,
            width = tile.width,
            height = tile.height,
            "Loaded height tile"
        );

        let mut tiles = self.tiles.write().unwrap_or_else(|e| e.into_inner());
        let tile = tiles
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tile));
        Ok(Arc::clone(tile))
    }

    /// Height in metres at `geohash`, 0 or less being sea level.
    pub fn height_at(&self, geohash: &str) -> Result<f64, TerrainError> {
        if geohash.len() < TILE_PRECISION {
            return Err(GeohashError::Precision(geohash.len()).into());
        }
        if let Some(h) = self
            .heights
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(geohash)
        {
            return Ok(*h);
        }

        let position = tile_position(geohash)?;
        let tile = self.tile(&position.tile)?;
        let height = position.height_in(&tile);

        let mut heights = self.heights.lock().unwrap_or_else(|e| e.into_inner());
        if heights.len() >= self.height_cache_limit {
            debug!(entries = heights.len(), "Height cache full, clearing");
            heights.clear();
        }
        heights.insert(geohash.to_string(), height);
        Ok(height)
    }

    /// Biome and its strength in `[0, 1]` at `geohash`.
    pub fn biome_at(&self, geohash: &str) -> Result<(BiomeType, f64), TerrainError> {
        if geohash.starts_with(ICE_PREFIX) {
            return Ok((BiomeType::Ice, 1.0));
        }
        let continent = self
            .seed
            .continent(geohash)
            .ok_or_else(|| TerrainError::UnknownContinent(geohash.to_string()))?;
        let height = self.height_at(geohash)?;
        Ok(biome::classify(geohash, height, continent))
    }

    /// 0 if the unit-precision cell at `(row, col)` is walkable, else 1.
    /// Rows beyond the poles are blocked; columns wrap.
    pub fn traversal_cost(&self, row: i64, col: i64) -> Result<u8, TerrainError> {
        let (rows, cols) = grid_size(self.unit_precision);
        if !(0..rows).contains(&row) {
            return Ok(1);
        }
        let geohash = col_row_to_geohash(col.rem_euclid(cols), row, self.unit_precision)?;
        let (biome, _) = self.biome_at(&geohash)?;
        Ok(if biome.is_traversable() { 0 } else { 1 })
    }
}
