pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::pipeline::TickPipeline;
use crate::world::terrain::TerrainField;
use protocol::HealthStatus;

/// Shared state for connection handlers.
pub struct ServerState {
    pub pipeline: Arc<TickPipeline>,
    pub terrain: Arc<TerrainField>,
    pub started: Instant,
}

impl ServerState {
    pub fn new(pipeline: Arc<TickPipeline>, terrain: Arc<TerrainField>) -> Self {
        ServerState {
            pipeline,
            terrain,
            started: Instant::now(),
        }
    }

    pub async fn health(&self) -> HealthStatus {
        let (players, monsters) = self
            .pipeline
            .context()
            .with_snapshot(|s| (s.players.len(), s.monsters.len()))
            .await;
        HealthStatus {
            status: "ok",
            uptime_secs: self.started.elapsed().as_secs(),
            players,
            monsters,
            dirty: self.pipeline.context().dirty_count(),
            queue_depth: self.pipeline.queue().len(),
            cached_tiles: self.terrain.cached_tiles(),
            stats: self.pipeline.stats(),
        }
    }
}

/// Serve the health endpoint on `addr` until the task is dropped.
pub async fn start_server(
    state: Arc<ServerState>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Health endpoint at http://{}/health", addr);
    serve(listener, state).await
}

async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                error!(%peer, "Connection error: {}", e);
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    let request_line = String::from_utf8_lossy(&buf[..n])
        .lines()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let response = if request_line.starts_with("get /health ") || request_line == "get /health" {
        let body = serde_json::to_string(&state.health().await)?;
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    } else {
        let body = "not found";
        format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
