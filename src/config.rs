use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use tracing::trace;

const BIND_ADDR_ENV: &str = "NETWATCH_BIND_ADDR";

const DB_PATH_ENV: &str = "NETWATCH_DB";

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory directory (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./netwatch.db")
}

/// Timing of the liveness monitor
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval_secs: u64,

    /// Upper bound for a single reachability probe
    pub probe_timeout_ms: u64,

    /// Echo requests per probe; any reply counts as reachable
    pub probe_count: u16,

    /// Probes in flight at once within a cycle (1 = sequential)
    pub max_concurrent_probes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            probe_timeout_ms: 1000,
            probe_count: 1,
            max_concurrent_probes: 1,
        }
    }
}

impl MonitorConfig {
    /// Never zero, even for a config that skipped [`MonitorConfig::validate`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_secs == 0 {
            bail!("monitor.interval_secs must be at least 1");
        }
        if self.probe_timeout_ms == 0 {
            bail!("monitor.probe_timeout_ms must be at least 1");
        }
        if self.probe_count == 0 {
            bail!("monitor.probe_count must be at least 1");
        }
        if self.max_concurrent_probes == 0 {
            bail!("monitor.max_concurrent_probes must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind: SocketAddr,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_enable_cors() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Storage configuration (defaults to SQLite at ./netwatch.db)
    pub storage: Option<StorageConfig>,

    pub api: Option<ApiSettings>,
}

impl Config {
    /// Apply `NETWATCH_BIND_ADDR` and `NETWATCH_DB` overrides
    pub fn apply_env(mut self) -> anyhow::Result<Self> {
        if let Ok(bind) = std::env::var(BIND_ADDR_ENV) {
            let mut api = self.api.unwrap_or_default();
            api.bind = bind
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {BIND_ADDR_ENV} '{bind}': {e}"))?;
            self.api = Some(api);
        }

        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            self.storage = Some(StorageConfig::Sqlite {
                path: PathBuf::from(path),
            });
        }

        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.monitor.validate()
    }
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content).inspect(|config| trace!("loaded config: {config:?}"))
}
