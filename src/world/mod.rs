pub mod abilities;
pub mod bestiary;
pub mod biome;
pub mod direction;
pub mod entity;
pub mod geohash;
pub mod range;
pub mod terrain;
pub mod topology;

pub use biome::BiomeType;
pub use direction::Direction;
pub use entity::{Entity, Item, Location, Monster, Player};
pub use geohash::{GeohashError, GridCell};
pub use terrain::{TerrainError, TerrainField};
