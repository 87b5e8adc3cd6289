//! slotgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use slotgrid_autoscale::AutoscaleSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotgridConfig {
    #[serde(default)]
    pub autoscale: AutoscaleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscaleConfig {
    /// Slots offered by one agent. Non-positive disables scaling.
    #[serde(default = "default_slots_per_agent")]
    pub slots_per_agent: i32,
    #[serde(default)]
    pub scale_bound: i32,
    /// Tick interval, e.g. "30s" or "5m".
    #[serde(default = "default_interval")]
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_slots_per_agent() -> i32 {
    8
}

fn default_interval() -> String {
    "30s".to_string()
}

fn default_port() -> u16 {
    8460
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/slotgrid")
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            slots_per_agent: default_slots_per_agent(),
            scale_bound: 0,
            interval: default_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

impl SlotgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SlotgridConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.autoscale.interval()?;
        Ok(())
    }

    /// Load the file when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

impl AutoscaleConfig {
    pub fn settings(&self) -> AutoscaleSettings {
        AutoscaleSettings {
            slots_per_agent: self.slots_per_agent,
            scale_bound: self.scale_bound,
        }
    }

    /// Tick interval. Zero and unparseable values are rejected.
    pub fn interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.interval)
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h", or bare seconds.
fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, scale_ms) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else {
        (s, 1_000)
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid interval {s:?}, expected e.g. \"30s\" or \"5m\""))?;
    if n == 0 {
        anyhow::bail!("interval must be positive, got {s:?}");
    }
    Ok(Duration::from_millis(n.saturating_mul(scale_ms)))
}
