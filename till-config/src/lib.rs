//! Layered configuration for Till binaries.
//!
//! Sources, later ones winning: `{dir}/default.toml`, `{dir}/{env}.toml`,
//! then `TILL__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "TILL";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, e.g. `info` or `till_ledger=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files. Logs go to stderr only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DashboardConfig {
    #[serde(default = "default_period")]
    pub default_period: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_period: default_period(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/till.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_period() -> String {
    "week".to_string()
}

/// Load configuration for `env` from `dir`. Missing files are skipped.
pub fn load_config(dir: impl AsRef<Path>, env: &str) -> Result<AppConfig> {
    let dir = dir.as_ref();
    let settings = Config::builder()
        .add_source(File::from(dir.join("default.toml")).required(false))
        .add_source(File::from(dir.join(format!("{env}.toml"))).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {}", dir.display()))?;
    settings
        .try_deserialize()
        .with_context(|| format!("invalid configuration for environment '{env}'"))
}

impl AppConfig {
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration as TOML")
    }
}
