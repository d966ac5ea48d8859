use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{DungeonMasterConfig, WorldSeed};
use crate::decision::DecisionPolicy;
use crate::game::{self, ActionApi, DryRunActionApi, HttpActionApi, MemoryWorld};
use crate::pathfinding::{a_star, walk};
use crate::pipeline::{Collaborators, PipelineSettings, TickPipeline};
use crate::server::{self, ServerState};
use crate::world::biome::BiomeType;
use crate::world::direction::Direction;
use crate::world::geohash::{GridCell, col_row_to_geohash, geohashes_nearby, grid_size};
use crate::world::terrain::{TerrainError, TerrainField};
use crate::world::topology::{TilePosition, tile_position};

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<DungeonMasterConfig, String> {
    if !path.exists() {
        return Ok(DungeonMasterConfig::default());
    }
    DungeonMasterConfig::from_file(path)
}

pub fn build_terrain(config: &DungeonMasterConfig) -> Result<Arc<TerrainField>, String> {
    let seed = match &config.world_seed_file {
        Some(path) => WorldSeed::from_file(Path::new(path))?,
        None => WorldSeed::default(),
    };
    info!(seed = %seed.name, topology = %config.topology_directory, "World seed loaded");
    Ok(Arc::new(TerrainField::new(
        seed,
        &config.topology_directory,
        config.unit_precision,
        config.height_cache_limit,
    )))
}

/// Run the pipeline and health endpoint until ctrl-c.
pub async fn run(config: &DungeonMasterConfig, entities: &Path, dry_run: bool) -> Result<(), String> {
    let world = Arc::new(MemoryWorld::from_json_file(entities)?);
    info!(entities = world.len(), path = %entities.display(), "Entity fixture loaded");

    let api: Arc<dyn ActionApi> = if dry_run {
        info!("Dry run: actions are applied to the fixture only");
        Arc::new(DryRunActionApi::applying_to(Arc::clone(&world)))
    } else {
        let token = config.api_token()?;
        let api = HttpActionApi::new(
            &config.api_host,
            token,
            Duration::from_millis(config.request_timeout_ms),
        )
        .map_err(|e| format!("Cannot build HTTP client: {}", e))?;
        Arc::new(api)
    };

    let terrain = build_terrain(config)?;
    let pipeline = Arc::new(TickPipeline::new(
        Collaborators {
            index: world.clone(),
            store: world,
            api,
        },
        Arc::clone(&terrain),
        DecisionPolicy::from_config(config),
        PipelineSettings::from_config(config),
    ));

    let addr: SocketAddr = format!("{}:{}", config.health_bind, config.health_port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;
    let state = Arc::new(ServerState::new(Arc::clone(&pipeline), terrain));
    let server = tokio::spawn(async move {
        if let Err(e) = server::start_server(state, addr).await {
            error!("Health server error: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    Arc::clone(&pipeline).run(shutdown_rx).await;
    server.abort();

    let stats = pipeline.stats();
    info!(
        decisions = stats.decision_cycles,
        dispatched = stats.jobs_dispatched,
        failed = stats.jobs_failed,
        "Stopped"
    );
    Ok(())
}

/// Terrain facts about one geohash.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub cell: GridCell,
    pub tile: String,
    pub tile_row: i64,
    pub tile_col: i64,
    pub height: f64,
    pub biome: BiomeType,
    pub strength: f64,
    pub traversal_cost: Option<u8>,
    pub nearby: Vec<String>,
}

pub fn inspect_report(terrain: &TerrainField, geohash: &str) -> Result<InspectReport, TerrainError> {
    let cell = GridCell::from_geohash(geohash)?;
    let TilePosition { tile, row, col, .. } = tile_position(geohash)?;
    let height = terrain.height_at(geohash)?;
    let (biome, strength) = terrain.biome_at(geohash)?;
    let traversal_cost = if cell.precision == terrain.unit_precision() {
        Some(terrain.traversal_cost(cell.row, cell.col)?)
    } else {
        None
    };
    Ok(InspectReport {
        nearby: geohashes_nearby(geohash)?,
        cell,
        tile,
        tile_row: row,
        tile_col: col,
        height,
        biome,
        strength,
        traversal_cost,
    })
}

pub async fn inspect(
    config: &DungeonMasterConfig,
    geohash: &str,
    entities: Option<&Path>,
) -> Result<(), String> {
    let terrain = build_terrain(config)?;
    let report = inspect_report(&terrain, geohash).map_err(|e| e.to_string())?;

    println!("=== {} ===", geohash);
    println!("Grid: row {}, col {} (precision {})", report.cell.row, report.cell.col, report.cell.precision);
    println!("Tile: {} at row {}, col {}", report.tile, report.tile_row, report.tile_col);
    println!("Height: {:.0}m", report.height);
    println!("Biome: {} (strength {:.3})", report.biome, report.strength);
    match report.traversal_cost {
        Some(0) => println!("Traversable: yes"),
        Some(_) => println!("Traversable: no"),
        None => println!("Traversable: n/a (not unit precision {})", terrain.unit_precision()),
    }
    println!("Nearby: {}", report.nearby.join(" "));

    if let Some(path) = entities {
        let world = MemoryWorld::from_json_file(path)?;
        let colliders = world_colliders(&world, geohash).await?;
        println!("Colliders: {}", colliders);
    }
    Ok(())
}

async fn world_colliders(world: &MemoryWorld, geohash: &str) -> Result<usize, String> {
    let index: &dyn game::EntityIndex = world;
    index.count_colliders(geohash).await.map_err(|e| e.to_string())
}

/// A planned route between two unit cells.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPath {
    pub directions: Vec<Direction>,
    pub end: String,
}

pub fn plan(
    terrain: &TerrainField,
    from: &str,
    to: &str,
    range: Option<i64>,
    max_iterations: usize,
) -> Result<PlannedPath, String> {
    let start = GridCell::from_geohash(from).map_err(|e| e.to_string())?;
    let goal = GridCell::from_geohash(to).map_err(|e| e.to_string())?;
    for cell in [&start, &goal] {
        if cell.precision != terrain.unit_precision() {
            return Err(format!(
                "{} has precision {}, expected unit precision {}",
                cell.geohash,
                cell.precision,
                terrain.unit_precision()
            ));
        }
    }

    let directions = a_star(
        (start.row, start.col),
        (goal.row, goal.col),
        |r, c| terrain.traversal_cost(r, c),
        range,
        max_iterations,
    )
    .map_err(|e| e.to_string())?;

    let (row, col) = walk((start.row, start.col), &directions);
    let (_, cols) = grid_size(terrain.unit_precision());
    let end = col_row_to_geohash(col.rem_euclid(cols), row, terrain.unit_precision())
        .map_err(|e| e.to_string())?;
    Ok(PlannedPath { directions, end })
}

pub fn path(
    config: &DungeonMasterConfig,
    from: &str,
    to: &str,
    range: Option<i64>,
    max_iterations: Option<usize>,
) -> Result<(), String> {
    let terrain = build_terrain(config)?;
    let planned = plan(
        &terrain,
        from,
        to,
        range,
        max_iterations.unwrap_or(config.max_path_iterations),
    )?;

    if planned.directions.is_empty() {
        println!("No path from {} to {}", from, to);
        return Ok(());
    }
    let steps: Vec<&str> = planned.directions.iter().map(|d| d.as_str()).collect();
    println!("{} step(s): {}", steps.len(), steps.join(" "));
    println!("Ends at {}", planned.end);
    Ok(())
}
