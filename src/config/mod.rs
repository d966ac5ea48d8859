pub mod dungeon_master;
pub mod world_seed;

pub use dungeon_master::DungeonMasterConfig;
pub use world_seed::{ContinentSeed, SpatialTiers, WorldSeed};
