use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use dungeon_master::cli::commands;

#[derive(Parser)]
#[command(name = "dungeon-master")]
#[command(about = "Drives monster behaviour for a geohash-gridded multiplayer world")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "dungeon-master.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tick pipeline and health endpoint
    Run {
        /// JSON file of entities to drive
        #[arg(short, long)]
        entities: PathBuf,

        /// Apply actions to the entity file in memory instead of calling the game API
        #[arg(long)]
        dry_run: bool,
    },

    /// Show terrain at a geohash
    Inspect {
        #[arg(short, long)]
        geohash: String,

        /// JSON file of entities to count colliders from
        #[arg(short, long)]
        entities: Option<PathBuf>,
    },

    /// Plan a path between two unit-precision geohashes
    Path {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Stop once within this many cells of the goal
        #[arg(long)]
        range: Option<i64>,

        #[arg(long)]
        max_iterations: Option<usize>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = Path::new(&cli.config);

    let config = match commands::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level, cli.log_json);
    if !config_path.exists() {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Run { entities, dry_run } => {
            if let Err(e) = commands::run(&config, &entities, dry_run).await {
                eprintln!("Pipeline error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect { geohash, entities } => {
            if let Err(e) = commands::inspect(&config, &geohash, entities.as_deref()).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Path {
            from,
            to,
            range,
            max_iterations,
        } => {
            if let Err(e) = commands::path(&config, &from, &to, range, max_iterations) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
