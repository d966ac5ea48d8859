use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DungeonMasterConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_respawn_interval_ms")]
    pub respawn_interval_ms: u64,
    #[serde(default = "default_decision_interval_ms")]
    pub decision_interval_ms: u64,
    #[serde(default = "default_dispatch_batch_size")]
    pub dispatch_batch_size: usize,
    #[serde(default = "default_dispatch_idle_backoff_ms")]
    pub dispatch_idle_backoff_ms: u64,
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    #[serde(default = "default_disengage_range")]
    pub disengage_range: i64,
    #[serde(default = "default_melee_range")]
    pub melee_range: i64,
    #[serde(default)]
    pub use_abilities: bool,
    /// Send move jobs with the player's geohash and plan when dispatching.
    #[serde(default)]
    pub plan_at_dispatch: bool,
    #[serde(default = "default_max_path_iterations")]
    pub max_path_iterations: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_nearby_precision")]
    pub nearby_precision: usize,
    #[serde(default = "default_unit_precision")]
    pub unit_precision: usize,
    #[serde(default = "default_topology_directory")]
    pub topology_directory: String,
    #[serde(default = "default_height_cache_limit")]
    pub height_cache_limit: usize,
    #[serde(default)]
    pub world_seed_file: Option<String>,
    #[serde(default = "default_health_bind")]
    pub health_bind: String,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_host() -> String {
    "http://localhost:5173".to_string()
}
fn default_api_token_env() -> String {
    "DUNGEON_MASTER_TOKEN".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_refresh_interval_ms() -> u64 {
    10_000
}
fn default_respawn_interval_ms() -> u64 {
    30_000
}
fn default_decision_interval_ms() -> u64 {
    3000
}
fn default_dispatch_batch_size() -> usize {
    500
}
fn default_dispatch_idle_backoff_ms() -> u64 {
    100
}
fn default_max_queue_depth() -> usize {
    10_000
}
fn default_disengage_range() -> i64 {
    5
}
fn default_melee_range() -> i64 {
    1
}
fn default_max_path_iterations() -> usize {
    500
}
fn default_page_size() -> usize {
    200
}
fn default_nearby_precision() -> usize {
    6
}
fn default_unit_precision() -> usize {
    8
}
fn default_topology_directory() -> String {
    "./topology".to_string()
}
fn default_height_cache_limit() -> usize {
    65_536
}
fn default_health_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_health_port() -> u16 {
    8119
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DungeonMasterConfig {
    fn default() -> Self {
        DungeonMasterConfig {
            api_host: default_api_host(),
            api_token_env: default_api_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            respawn_interval_ms: default_respawn_interval_ms(),
            decision_interval_ms: default_decision_interval_ms(),
            dispatch_batch_size: default_dispatch_batch_size(),
            dispatch_idle_backoff_ms: default_dispatch_idle_backoff_ms(),
            max_queue_depth: default_max_queue_depth(),
            disengage_range: default_disengage_range(),
            melee_range: default_melee_range(),
            use_abilities: false,
            plan_at_dispatch: false,
            max_path_iterations: default_max_path_iterations(),
            page_size: default_page_size(),
            nearby_precision: default_nearby_precision(),
            unit_precision: default_unit_precision(),
            topology_directory: default_topology_directory(),
            height_cache_limit: default_height_cache_limit(),
            world_seed_file: None,
            health_bind: default_health_bind(),
            health_port: default_health_port(),
            log_level: default_log_level(),
        }
    }
}

impl DungeonMasterConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: DungeonMasterConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn respawn_interval(&self) -> Duration {
        Duration::from_millis(self.respawn_interval_ms)
    }

    pub fn decision_interval(&self) -> Duration {
        Duration::from_millis(self.decision_interval_ms)
    }

    pub fn dispatch_idle_backoff(&self) -> Duration {
        Duration::from_millis(self.dispatch_idle_backoff_ms)
    }

    /// Bearer credential for the action API, read from the configured variable.
    pub fn api_token(&self) -> Result<String, String> {
        std::env::var(&self.api_token_env).map_err(|_| {
            format!(
                "Environment variable {} is not set. Export the dungeon master token before running.",
                self.api_token_env
            )
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !self.api_host.starts_with("http://") && !self.api_host.starts_with("https://") {
            errors.push(format!(
                "api_host must start with http:// or https://, got '{}'. Example: api_host = \"http://localhost:5173\"",
                self.api_host
            ));
        }

        for (name, value, example) in [
            ("refresh_interval_ms", self.refresh_interval_ms, 10_000),
            ("respawn_interval_ms", self.respawn_interval_ms, 30_000),
            ("decision_interval_ms", self.decision_interval_ms, 3000),
            ("request_timeout_ms", self.request_timeout_ms, 5000),
        ] {
            if value == 0 {
                errors.push(format!(
                    "{} must be > 0, got {}. Example: {} = {}",
                    name, value, name, example
                ));
            }
        }

        if self.dispatch_batch_size == 0 {
            errors.push(format!(
                "dispatch_batch_size must be > 0, got {}. Example: dispatch_batch_size = 500",
                self.dispatch_batch_size
            ));
        }

        if self.max_queue_depth < self.dispatch_batch_size {
            errors.push(format!(
                "max_queue_depth must be >= dispatch_batch_size ({}), got {}. Example: max_queue_depth = 10000",
                self.dispatch_batch_size, self.max_queue_depth
            ));
        }

        if self.melee_range < 0 {
            errors.push(format!(
                "melee_range must be >= 0, got {}. Example: melee_range = 1",
                self.melee_range
            ));
        }

        if self.disengage_range < self.melee_range {
            errors.push(format!(
                "disengage_range must be >= melee_range ({}), got {}. Example: disengage_range = 5",
                self.melee_range, self.disengage_range
            ));
        }

        if self.max_path_iterations == 0 {
            errors.push(format!(
                "max_path_iterations must be > 0, got {}. Example: max_path_iterations = 500",
                self.max_path_iterations
            ));
        }

        if self.page_size == 0 {
            errors.push(format!(
                "page_size must be > 0, got {}. Example: page_size = 200",
                self.page_size
            ));
        }

        if !(1..=12).contains(&self.unit_precision) {
            errors.push(format!(
                "unit_precision must be 1-12, got {}. Example: unit_precision = 8",
                self.unit_precision
            ));
        }

        if self.nearby_precision == 0 || self.nearby_precision > self.unit_precision {
            errors.push(format!(
                "nearby_precision must be 1-{} (unit_precision), got {}. Example: nearby_precision = 6",
                self.unit_precision, self.nearby_precision
            ));
        }

        if self.height_cache_limit == 0 {
            errors.push(format!(
                "height_cache_limit must be > 0, got {}. Example: height_cache_limit = 65536",
                self.height_cache_limit
            ));
        }

        if !(1024..=65535).contains(&self.health_port) {
            errors.push(format!(
                "health_port must be 1024-65535, got {}. Example: health_port = 8119",
                self.health_port
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
