use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const CONTINENTS: &str = "bcfguvyz89destwx2367kmqr0145hjnp";

/// Biome probabilities for one first-level geohash cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinentSeed {
    pub bio: f64,
    pub hostile: f64,
    pub water: f64,
}

impl ContinentSeed {
    pub fn total(&self) -> f64 {
        self.bio + self.hostile + self.water
    }
}

/// Geohash precision of each named spatial tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialTiers {
    pub continent: usize,
    pub territory: usize,
    pub guild: usize,
    pub city: usize,
    pub town: usize,
    pub village: usize,
    pub house: usize,
    pub unit: usize,
}

impl Default for SpatialTiers {
    fn default() -> Self {
        SpatialTiers {
            continent: 1,
            territory: 2,
            guild: 3,
            city: 4,
            town: 5,
            village: 6,
            house: 7,
            unit: 8,
        }
    }
}

/// Seed data the procedural terrain is derived from.
/// Same seed, same world: nothing derived from it is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub spatial: SpatialTiers,
    #[serde(default = "default_max_monsters")]
    pub max_monsters_per_continent: u64,
    /// Keyed by the single geohash character of the continent.
    pub continents: BTreeMap<String, ContinentSeed>,
}

fn default_max_monsters() -> u64 {
    10_000_000_000
}

impl Default for WorldSeed {
    fn default() -> Self {
        let continents = CONTINENTS
            .chars()
            .map(|c| {
                // "w" is kept dry for testing.
                let water = if c == 'w' { 0.0 } else { 0.1 };
                (
                    c.to_string(),
                    ContinentSeed {
                        bio: 0.5,
                        hostile: 0.2,
                        water,
                    },
                )
            })
            .collect();

        WorldSeed {
            name: "yggdrasil 01".to_string(),
            description: "The beginning".to_string(),
            spatial: SpatialTiers::default(),
            max_monsters_per_continent: default_max_monsters(),
            continents,
        }
    }
}

impl WorldSeed {
    /// Load a world seed from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let seed: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        seed.validate()?;
        Ok(seed)
    }

    /// The continent entry for the first character of `geohash`.
    pub fn continent(&self, geohash: &str) -> Option<&ContinentSeed> {
        let first = geohash.get(..1)?;
        self.continents.get(first)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.continents.is_empty() {
            return Err("continents must not be empty".to_string());
        }
        for (key, seed) in &self.continents {
            if key.len() != 1 || !CONTINENTS.contains(key.as_str()) {
                return Err(format!(
                    "continent key must be a single geohash character, got '{}'",
                    key
                ));
            }
            for (name, p) in [("bio", seed.bio), ("hostile", seed.hostile), ("water", seed.water)] {
                if !(0.0..=1.0).contains(&p) {
                    return Err(format!(
                        "continent '{}' {} must be 0.0-1.0, got {}",
                        key, name, p
                    ));
                }
            }
            if seed.total() > 1.0 + f64::EPSILON {
                return Err(format!(
                    "continent '{}' probabilities must sum to <= 1.0, got {}",
                    key,
                    seed.total()
                ));
            }
        }
        if !(1..=12).contains(&self.spatial.unit) {
            return Err(format!(
                "spatial.unit must be 1-12, got {}",
                self.spatial.unit
            ));
        }
        Ok(())
    }
}
