use serde::Serialize;

use crate::pipeline::StatsSnapshot;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub players: usize,
    pub monsters: usize,
    pub dirty: usize,
    pub queue_depth: usize,
    pub cached_tiles: usize,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}
