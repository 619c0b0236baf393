use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "STATICD_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "staticd.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub credentials: CredentialConfig,
    pub log: LogConfig,
}

/// Readiness notification mode for a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Edge,
    Level,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub listen_trigger: Trigger,
    pub conn_trigger: Trigger,
    /// Idle timeout in milliseconds; 0 disables eviction.
    pub timeout_ms: u64,
    /// Enable SO_LINGER (1s) on the listening socket.
    pub linger: bool,
    pub doc_root: PathBuf,
    pub max_connections: usize,
    pub max_events: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:1316".to_string(),
            listen_trigger: Trigger::Edge,
            conn_trigger: Trigger::Edge,
            timeout_ms: 60_000,
            linger: false,
            doc_root: PathBuf::from("resources"),
            max_connections: 65_536,
            max_events: 1024,
        }
    }
}

impl ServerConfig {
    /// Numeric trigger mode: bit 0 = edge-triggered connections, bit 1 =
    /// edge-triggered listener (0 = both level, 3 = both edge).
    pub fn trigger_mode(&self) -> u8 {
        let mut mode = 0;
        if self.conn_trigger == Trigger::Edge {
            mode |= 1;
        }
        if self.listen_trigger == Trigger::Edge {
            mode |= 2;
        }
        mode
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub threads: usize,
    /// Pending tasks allowed before `submit` blocks the reactor.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 6,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: usize,
    /// Accounts preloaded into the in-memory store.
    pub users: HashMap<String, String>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "root".to_string(),
            database: "webserver".to_string(),
            pool_size: 12,
            users: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub level: String,
    /// Lines buffered for the background writer; 0 writes synchronously.
    pub queue_size: usize,
    /// Directory for daily log files; stdout when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            queue_size: 1024,
            dir: None,
        }
    }
}

impl Config {
    /// Loads the YAML file named by `STATICD_CONFIG` (or `staticd.yaml` when
    /// present), falling back to defaults, then applies `LISTEN`.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = addr;
        }
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
