use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when `WORLDSYNC_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "worldsync.toml";

/// Complete worldsync configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldSyncConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Listener and static asset configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Directory holding the browser client
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// URL prefix the static directory is served under
    #[serde(default = "default_static_route")]
    pub static_route: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_static_route() -> String {
    "/static".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            static_route: default_static_route(),
        }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Largest accepted `/entity` body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Allow any origin (for clients served from elsewhere)
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            cors_permissive: false,
        }
    }
}

impl WorldSyncConfig {
    /// Override fields from WORLDSYNC_* env vars. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("WORLDSYNC_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("WORLDSYNC_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WORLDSYNC_MAX_BODY_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                self.api.max_body_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("WORLDSYNC_CORS_PERMISSIVE") {
            if let Ok(b) = v.parse::<bool>() {
                self.api.cors_permissive = b;
            }
        }
    }

    /// Check values the router relies on and normalize the static route
    pub fn validate(&mut self) -> Result<()> {
        let route = self.server.static_route.trim_end_matches('/').to_string();
        if !route.starts_with('/') {
            bail!(
                "server.static_route must be a non-root path starting with '/', got '{}'",
                self.server.static_route
            );
        }
        self.server.static_route = route;

        if self.api.max_body_bytes == 0 {
            bail!("api.max_body_bytes must be greater than zero");
        }

        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<WorldSyncConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: WorldSyncConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Resolve configuration for the server binary
///
/// Reads `WORLDSYNC_CONFIG` if set, else `worldsync.toml` when present, else
/// defaults; env overrides are applied on top and the result validated.
pub fn load() -> Result<WorldSyncConfig> {
    let mut config = match std::env::var("WORLDSYNC_CONFIG") {
        Ok(path) => load_config(Path::new(&path))?,
        Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        Err(_) => WorldSyncConfig::default(),
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}
