pub mod cli;
pub mod config;
pub mod decision;
pub mod game;
pub mod pathfinding;
pub mod pipeline;
pub mod server;
pub mod world;
