use serde::{Deserialize, Serialize};

use crate::config::world_seed::ContinentSeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiomeType {
    Forest,
    Desert,
    Tundra,
    Grassland,
    Wetland,
    Mountain,
    Hills,
    Plains,
    Swamp,
    Water,
    Ice,
}

/// Static description of a biome. A traversable speed of 0 blocks movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Biome {
    pub biome: BiomeType,
    pub name: &'static str,
    pub description: &'static str,
    pub traversable_speed: f64,
}

impl BiomeType {
    pub const ALL: [BiomeType; 11] = [
        BiomeType::Forest,
        BiomeType::Desert,
        BiomeType::Tundra,
        BiomeType::Grassland,
        BiomeType::Wetland,
        BiomeType::Mountain,
        BiomeType::Hills,
        BiomeType::Plains,
        BiomeType::Swamp,
        BiomeType::Water,
        BiomeType::Ice,
    ];

    pub fn info(self) -> Biome {
        let (name, description, traversable_speed) = match self {
            BiomeType::Forest => (
                "Forest",
                "A dense collection of trees and vegetation, home to a variety of wildlife.",
                0.8,
            ),
            BiomeType::Desert => (
                "Desert",
                "A dry, arid region with extreme temperatures and sparse vegetation.",
                1.0,
            ),
            BiomeType::Tundra => (
                "Tundra",
                "A cold, treeless area with a frozen subsoil and adapted wildlife.",
                1.0,
            ),
            BiomeType::Grassland => (
                "Grassland",
                "A region dominated by grasses, with few trees.",
                1.0,
            ),
            BiomeType::Wetland => (
                "Wetland",
                "An area saturated with water, supporting aquatic plants.",
                0.5,
            ),
            BiomeType::Mountain => (
                "Mountain",
                "A high elevation region with steep terrain.",
                0.0,
            ),
            BiomeType::Hills => ("Hills", "A region of elevated terrain.", 0.5),
            BiomeType::Plains => ("Plains", "A large area of flat land.", 1.0),
            BiomeType::Swamp => (
                "Swamp",
                "A wetland area thick with vegetation.",
                0.7,
            ),
            BiomeType::Water => ("Water", "A large body of water.", 0.0),
            BiomeType::Ice => (
                "Ice",
                "A region covered in ice, with limited vegetation and wildlife.",
                0.8,
            ),
        };
        Biome {
            biome: self,
            name,
            description,
            traversable_speed,
        }
    }

    pub fn is_traversable(self) -> bool {
        self.info().traversable_speed > 0.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BiomeType::Forest => "forest",
            BiomeType::Desert => "desert",
            BiomeType::Tundra => "tundra",
            BiomeType::Grassland => "grassland",
            BiomeType::Wetland => "wetland",
            BiomeType::Mountain => "mountain",
            BiomeType::Hills => "hills",
            BiomeType::Plains => "plains",
            BiomeType::Swamp => "swamp",
            BiomeType::Water => "water",
            BiomeType::Ice => "ice",
        }
    }
}

impl std::fmt::Display for BiomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reproducible 32-bit hash of a string (`h * 31 + c`, wrapping).
pub fn string_to_random_number(s: &str) -> u32 {
    s.chars()
        .fold(0_u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

/// Sine-based pseudo-random value in `[0, 1)` derived from `seed`.
pub fn seeded_random(seed: f64) -> f64 {
    let x = seed.sin() * 10000.0;
    x - x.floor()
}

/// Classify a cell that is above sea level from its continent's probabilities.
///
/// The scaled roll falls into a forest band `[0, bio)`, a water band
/// `[bio, bio + water)`, or plains. Inside a band the strength peaks at 1 at
/// its midpoint and falls to 0 at either edge.
pub fn classify(geohash: &str, height: f64, continent: &ContinentSeed) -> (BiomeType, f64) {
    if height < 1.0 {
        return (BiomeType::Water, 1.0);
    }

    let rv = seeded_random(string_to_random_number(geohash) as f64) * continent.total();

    if rv < continent.bio {
        let mid = continent.bio / 2.0;
        return (BiomeType::Forest, 1.0 - (rv - mid).abs() / mid);
    }
    if rv < continent.bio + continent.water {
        let mid = continent.water / 2.0;
        return (BiomeType::Water, 1.0 - (rv - continent.bio - mid).abs() / mid);
    }
    (BiomeType::Plains, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(bio: f64, hostile: f64, water: f64) -> ContinentSeed {
        ContinentSeed {
            bio,
            hostile,
            water,
        }
    }

    #[test]
    fn table_speeds() {
        assert!(!BiomeType::Mountain.is_traversable());
        assert!(!BiomeType::Water.is_traversable());
        assert!(BiomeType::Ice.is_traversable());
        assert_eq!(BiomeType::Swamp.info().traversable_speed, 0.7);
        let blocked = BiomeType::ALL
            .iter()
            .filter(|b| !b.is_traversable())
            .count();
        assert_eq!(blocked, 2);
    }

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(string_to_random_number(""), 0);
        assert_eq!(string_to_random_number("a"), 97);
        assert_eq!(string_to_random_number("ab"), 97 * 31 + 98);
        // Long strings wrap instead of overflowing.
        let long = "w21z3m6kw21z3m6kw21z3m6k";
        assert_eq!(string_to_random_number(long), string_to_random_number(long));
    }

    #[test]
    fn seeded_random_in_unit_interval() {
        for s in ["", "w", "w21z", "w21z3m6k", "gcpvj0du", "h9zzzzzz"] {
            let v = seeded_random(string_to_random_number(s) as f64);
            assert!((0.0..1.0).contains(&v), "{} -> {}", s, v);
        }
    }

    #[test]
    fn below_sea_level_is_water() {
        assert_eq!(classify("w21z3m6k", 0.0, &seed(1.0, 0.0, 0.0)), (BiomeType::Water, 1.0));
    }

    #[test]
    fn classification_is_deterministic() {
        let continent = seed(0.5, 0.2, 0.1);
        for g in ["w21z3m6k", "w21z3m6m", "gcpvj0du", "s0000000"] {
            assert_eq!(classify(g, 100.0, &continent), classify(g, 100.0, &continent));
        }
    }

    #[test]
    fn all_bio_continent_is_forest() {
        let continent = seed(1.0, 0.0, 0.0);
        for g in ["w21z3m6k", "w21z3m6m", "gcpvj0du"] {
            let (biome, strength) = classify(g, 100.0, &continent);
            assert_eq!(biome, BiomeType::Forest);
            assert!((0.0..=1.0).contains(&strength));
        }
    }

    #[test]
    fn all_water_continent_is_water() {
        let (biome, strength) = classify("w21z3m6k", 100.0, &seed(0.0, 0.0, 1.0));
        assert_eq!(biome, BiomeType::Water);
        assert!((0.0..=1.0).contains(&strength));
    }

    /// Roll for a geohash whose roll is below 0.5, so both bands fit in [0, 1].
    fn low_roll() -> (&'static str, f64) {
        let g = "gcpvj0du";
        let r = seeded_random(string_to_random_number(g) as f64);
        assert!(r > 0.0 && r < 0.5, "{} -> {}", g, r);
        (g, r)
    }

    #[test]
    fn strength_peaks_at_band_midpoint() {
        let (g, r) = low_roll();

        let (biome, strength) = classify(g, 100.0, &seed(2.0 * r, 1.0 - 2.0 * r, 0.0));
        assert_eq!(biome, BiomeType::Forest);
        assert!((strength - 1.0).abs() < 1e-9, "forest strength {}", strength);

        let (biome, strength) = classify(g, 100.0, &seed(0.0, 1.0 - 2.0 * r, 2.0 * r));
        assert_eq!(biome, BiomeType::Water);
        assert!((strength - 1.0).abs() < 1e-9, "water strength {}", strength);
    }

    #[test]
    fn strength_falls_to_zero_at_band_edges() {
        let (g, r) = low_roll();
        let just_above = r * (1.0 + 1e-6);
        let just_below = r * (1.0 - 1e-6);

        // Roll just inside the top of the forest band.
        let (biome, strength) = classify(g, 100.0, &seed(just_above, 1.0 - just_above, 0.0));
        assert_eq!(biome, BiomeType::Forest);
        assert!((0.0..1e-4).contains(&strength), "forest edge {}", strength);

        // Roll just inside the top of the water band.
        let (biome, strength) = classify(g, 100.0, &seed(0.0, 1.0 - just_above, just_above));
        assert_eq!(biome, BiomeType::Water);
        assert!((0.0..1e-4).contains(&strength), "water top edge {}", strength);

        // Roll just past the forest band, at the bottom of the water band.
        let (biome, strength) = classify(g, 100.0, &seed(just_below, 0.5 - just_below, 0.5));
        assert_eq!(biome, BiomeType::Water);
        assert!((0.0..1e-4).contains(&strength), "water bottom edge {}", strength);
    }

    #[test]
    fn hostile_only_continent_is_plains() {
        assert_eq!(
            classify("w21z3m6k", 100.0, &seed(0.0, 1.0, 0.0)),
            (BiomeType::Plains, 1.0)
        );
    }
}
