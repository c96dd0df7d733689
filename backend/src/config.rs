//! Layered application configuration.
//!
//! Priority, lowest first: compiled defaults, the TOML file, `EPOS_*`
//! environment variables (`__` separates sections, e.g.
//! `EPOS_LIMITS__MAX_ROWS=500`), then command line overrides.

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "epos_mass_update.toml";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LimitsConfig {
    pub max_file_size_bytes: u64,
    /// Header-inclusive.
    pub max_rows: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub validation_timeout_secs: u64,
    pub update_timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub file_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1_500_000,
            max_rows: 10_000,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            validation_timeout_secs: 30,
            update_timeout_secs: 60,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("epos_records.sqlite"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_name: "EPOS_Invalid_IDs_Report.csv".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then `path` if it exists, then the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("EPOS_").split("__"));

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command line overrides. Only `Some` values replace the loaded ones.
    pub fn apply_cli_overrides(&mut self, max_rows: Option<usize>, max_file_size: Option<u64>) {
        if let Some(rows) = max_rows {
            self.limits.max_rows = rows;
        }
        if let Some(size) = max_file_size {
            self.limits.max_file_size_bytes = size;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.max_rows == 0 {
            bail!("limits.max_rows must be at least 1");
        }
        if self.limits.max_file_size_bytes == 0 {
            bail!("limits.max_file_size_bytes must be at least 1");
        }
        if self.remote.validation_timeout_secs == 0 || self.remote.update_timeout_secs == 0 {
            bail!("remote timeouts must be at least one second");
        }
        if self.report.file_name.trim().is_empty() {
            bail!("report.file_name must not be empty");
        }
        Ok(())
    }

    pub fn report_path(&self) -> PathBuf {
        self.report.output_dir.join(&self.report.file_name)
    }
}
