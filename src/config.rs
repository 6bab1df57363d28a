//! Configuration types for hewston-bars

use crate::telemetry::LogFormat;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
///
/// Every section is optional; a missing file section falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub derive: DeriveConfig,
    #[serde(default)]
    pub ticks: TicksConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// On-disk data locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root holding `raw/` tick containers and `derived/` outputs
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Dataset catalog file; defaults to `<base_dir>/catalog/datasets.json`
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            catalog_path: None,
        }
    }
}

impl DataConfig {
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join("catalog").join("datasets.json"))
    }
}

/// Derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveConfig {
    /// Exchange calendar identifier recorded in manifests
    #[serde(default = "default_calendar_version")]
    pub calendar_version: String,

    /// Exchange time zone (IANA name) used for sessions and daily buckets
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Hash tick containers; when off, file counts stand in for hashes
    #[serde(default = "default_true")]
    pub hash_inputs: bool,

    /// Upper bound on concurrent (symbol, year) jobs in `derive-all`
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_calendar_version() -> String {
    "NASDAQ-v1".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent_jobs() -> usize {
    4
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            calendar_version: default_calendar_version(),
            timezone: default_timezone(),
            hash_inputs: true,
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl DeriveConfig {
    /// Parse the configured exchange time zone
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {:?}: {}", self.timezone, e))
    }
}

/// Tick decoding settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicksConfig {
    /// Prices are 1e-9 fixed-point integers instead of decimal strings
    #[serde(default)]
    pub fixed_point_prices: bool,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings that would only fail later, mid-run
    pub fn validate(&self) -> anyhow::Result<()> {
        self.derive.tz()?;
        if self.derive.max_concurrent_jobs == 0 {
            anyhow::bail!("derive.max_concurrent_jobs must be at least 1");
        }
        Ok(())
    }

    /// Override the data root (e.g. from `--data-dir`)
    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = base_dir {
            self.data.base_dir = dir;
        }
        self
    }
}
