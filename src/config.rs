//! Server configuration.
//!
//! Loaded in three layers: built-in defaults, then the YAML file named by
//! `GANTRY_CONFIG` (if set), then the `LISTEN` and `GANTRY_CACHE_DIR`
//! environment variables.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//!   max_connections: 1024
//!   shutdown_grace_secs: 5
//!   legacy_trailer: false
//! cache_dir: "/var/cache/gantry"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::http::writer::ResponseFraming;

pub const CONFIG_ENV: &str = "GANTRY_CONFIG";
pub const LISTEN_ENV: &str = "LISTEN";
pub const CACHE_DIR_ENV: &str = "GANTRY_CACHE_DIR";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Where multipart uploads are staged.
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Upper bound on connections handled at once.
    pub max_connections: usize,
    /// How long `run` waits for in-flight connections after a stop.
    pub shutdown_grace_secs: u64,
    /// Append CRLF CRLF after every response body.
    pub legacy_trailer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache_dir: std::env::temp_dir().join("gantry-cache"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            shutdown_grace_secs: 5,
            legacy_trailer: false,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn framing(&self) -> ResponseFraming {
        if self.legacy_trailer {
            ResponseFraming::Legacy
        } else {
            ResponseFraming::Standard
        }
    }
}

impl Config {
    /// Defaults, overlaid by the `GANTRY_CONFIG` file and env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }
        if let Some(cache_dir) = std::env::var_os(CACHE_DIR_ENV) {
            cfg.cache_dir = PathBuf::from(cache_dir);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.max_connections == 0 {
            anyhow::bail!("server.max_connections must be at least 1");
        }
        if self.server.listen_addr.is_empty() {
            anyhow::bail!("server.listen_addr must not be empty");
        }
        Ok(())
    }
}
