// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod governor_setting;

pub use governor_setting::GovernorSetting;

pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const TEST: &str = "test";

pub const DEFAULT_SOCKET: &str = "/var/run/perflock.socket";
pub const DEFAULT_SOCKET_MODE: u32 = 0o777;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:9464";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Perflock {
    #[serde(rename = "perflock")]
    pub perflock: PerflockBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerflockBox {
    #[serde(default = "default_env")]
    pub env: String,
    pub logs: Option<Logs>,
    pub daemon: Option<Daemon>,
    pub governor: Option<Governor>,
    pub metrics: Option<Metrics>,
    pub shutdown: Option<Shutdown>,
    #[serde(skip)]
    pub socket_mode: u32,
}

impl Default for PerflockBox {
    fn default() -> Self {
        Self {
            env: default_env(),
            logs: None,
            daemon: None,
            governor: None,
            metrics: None,
            shutdown: None,
            socket_mode: DEFAULT_SOCKET_MODE,
        }
    }
}

fn default_env() -> String {
    DEV.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Daemon {
    pub socket: Option<String>,
    /// Octal permission bits for a filesystem socket, e.g. "0777".
    #[serde(rename = "socket_mode")]
    pub socket_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Governor {
    #[serde(rename = "sysfs_dir")]
    pub sysfs_dir: Option<PathBuf>,
    /// Default for client mode: "N%" or "none".
    pub percent: Option<GovernorSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn socket(&self) -> &str;
    fn socket_mode(&self) -> u32;
    fn sysfs_dir(&self) -> &Path;
    fn governor_setting(&self) -> GovernorSetting;
    fn metrics(&self) -> Option<&Metrics>;
    fn metrics_addr(&self) -> Result<SocketAddr>;
    fn shutdown_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Perflock;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.perflock.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.perflock.env == PROD
    }

    fn is_test(&self) -> bool {
        self.perflock.env == TEST
    }

    fn socket(&self) -> &str {
        self.perflock
            .daemon
            .as_ref()
            .and_then(|d| d.socket.as_deref())
            .unwrap_or(DEFAULT_SOCKET)
    }

    fn socket_mode(&self) -> u32 {
        self.perflock.socket_mode
    }

    fn sysfs_dir(&self) -> &Path {
        self.perflock
            .governor
            .as_ref()
            .and_then(|g| g.sysfs_dir.as_deref())
            .unwrap_or_else(|| Path::new(crate::cpupower::DEFAULT_ROOT))
    }

    fn governor_setting(&self) -> GovernorSetting {
        self.perflock
            .governor
            .as_ref()
            .and_then(|g| g.percent)
            .unwrap_or_default()
    }

    fn metrics(&self) -> Option<&Metrics> {
        self.perflock.metrics.as_ref()
    }

    fn metrics_addr(&self) -> Result<SocketAddr> {
        let addr = self
            .metrics()
            .and_then(|m| m.addr.as_deref())
            .unwrap_or(DEFAULT_METRICS_ADDR);
        addr.parse()
            .with_context(|| format!("invalid metrics.addr {:?}", addr))
    }

    fn shutdown_timeout(&self) -> Duration {
        self.perflock
            .shutdown
            .as_ref()
            .and_then(|s| s.timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        // Read file
        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Parses YAML and derives the processed fields.
    pub fn parse(data: &str) -> Result<Self> {
        let mut cfg: Perflock = serde_yaml::from_str(data)?;

        cfg.perflock.socket_mode = match cfg.perflock.daemon.as_ref().and_then(|d| d.socket_mode.as_deref()) {
            Some(mode) => parse_mode(mode)?,
            None => DEFAULT_SOCKET_MODE,
        };

        if let Some(metrics) = cfg.metrics() {
            if metrics.enabled {
                cfg.metrics_addr()?;
            }
        }

        Ok(cfg)
    }

    /// Overrides the daemon socket path.
    pub fn set_socket(&mut self, socket: impl Into<String>) {
        let daemon = self.perflock.daemon.get_or_insert(Daemon {
            socket: None,
            socket_mode: None,
        });
        daemon.socket = Some(socket.into());
    }
}

fn parse_mode(mode: &str) -> Result<u32> {
    let digits = mode.trim_start_matches("0o");
    let bits = u32::from_str_radix(digits, 8).with_context(|| format!("invalid daemon.socket_mode {:?}", mode))?;
    anyhow::ensure!(bits <= 0o7777, "invalid daemon.socket_mode {:?}", mode);
    Ok(bits)
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
