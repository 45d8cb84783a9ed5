//! ---
//! lt_section: "04-configuration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Load tester configuration model and loader."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_workload() -> String {
    "key-value".to_owned()
}

fn default_writer_threads() -> usize {
    2
}

fn default_reader_threads() -> usize {
    8
}

fn default_num_unique_keys() -> u64 {
    1_000_000
}

fn default_value_size() -> usize {
    64
}

fn default_report_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Resolved configuration for a single load test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTesterConfig {
    /// Registry name of the workload to drive.
    #[serde(default = "default_workload")]
    pub workload: String,
    /// Overrides the workload's declared app type when set.
    #[serde(default)]
    pub app_type: Option<AppType>,
    #[serde(default)]
    pub threads: ThreadsConfig,
    /// Skip the drop/create schema reset before workers start.
    #[serde(default)]
    pub reuse_existing_schema: bool,
    /// Raise the cooperative stop flag when an interrupt arrives mid-run.
    #[serde(default)]
    pub stop_on_interrupt: bool,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub key_value: KeyValueConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`LoadTesterConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LoadTesterConfig,
    pub source: Option<PathBuf>,
}

impl LoadTesterConfig {
    pub const ENV_CONFIG_PATH: &'static str = "LOADTESTER_CONFIG";

    /// Load configuration from disk, respecting the `LOADTESTER_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedConfig> {
        if let Some(path) = Self::env_override() {
            let config = Self::from_path(&path)?;
            return Ok(LoadedConfig {
                config,
                source: Some(path),
            });
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Like [`LoadTesterConfig::load_with_source`] but falls back to defaults when
    /// neither the environment override nor any candidate exists.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedConfig> {
        let any_present = Self::env_override().is_some()
            || candidates.iter().any(|candidate| candidate.as_ref().exists());
        if any_present {
            return Self::load_with_source(candidates);
        }
        debug!("no configuration file present; using defaults");
        Ok(LoadedConfig {
            config: Self::default(),
            source: None,
        })
    }

    fn env_override() -> Option<PathBuf> {
        std::env::var(Self::ENV_CONFIG_PATH)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<LoadTesterConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Total number of worker units a concurrent run will create.
    pub fn total_threads(&self) -> usize {
        self.threads.writers + self.threads.readers
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.workload.trim().is_empty() {
            return Err(anyhow!("workload name must not be empty"));
        }
        self.limits.validate()?;
        self.key_value.validate()?;
        if self.reporting.interval.is_zero() {
            return Err(anyhow!("reporting interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for LoadTesterConfig {
    fn default() -> Self {
        Self {
            workload: default_workload(),
            app_type: None,
            threads: ThreadsConfig::default(),
            reuse_existing_schema: false,
            stop_on_interrupt: false,
            limits: LimitsConfig::default(),
            key_value: KeyValueConfig::default(),
            reporting: ReportingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for LoadTesterConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: LoadTesterConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Execution shape of a workload.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// Runs once, synchronously, without a worker pool.
    Simple,
    /// Runs under the writer/reader worker pool.
    #[default]
    Concurrent,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Simple => "simple",
            AppType::Concurrent => "concurrent",
        }
    }
}

impl std::fmt::Display for AppType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(AppType::Simple),
            "concurrent" => Ok(AppType::Concurrent),
            other => Err(format!("unknown app type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    #[serde(default = "default_writer_threads")]
    pub writers: usize,
    #[serde(default = "default_reader_threads")]
    pub readers: usize,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            writers: default_writer_threads(),
            readers: default_reader_threads(),
        }
    }
}

/// Stop conditions enforced by workloads through their operation budget.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_writes: Option<u64>,
    #[serde(default)]
    pub max_reads: Option<u64>,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub run_time: Option<Duration>,
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.run_time, Some(run_time) if run_time.is_zero()) {
            return Err(anyhow!("limits.run_time must be greater than zero"));
        }
        Ok(())
    }

    /// Whether any stop condition is configured at all.
    pub fn is_bounded(&self) -> bool {
        self.max_writes.is_some() || self.max_reads.is_some() || self.run_time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueConfig {
    #[serde(default = "default_num_unique_keys")]
    pub num_unique_keys: u64,
    #[serde(default = "default_value_size")]
    pub value_size: usize,
}

impl KeyValueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_unique_keys == 0 {
            return Err(anyhow!("key_value.num_unique_keys must be at least 1"));
        }
        if self.value_size == 0 {
            return Err(anyhow!("key_value.value_size must be at least 1"));
        }
        Ok(())
    }
}

impl Default for KeyValueConfig {
    fn default() -> Self {
        Self {
            num_unique_keys: default_num_unique_keys(),
            value_size: default_value_size(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_report_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval: default_report_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving a daily rolling JSON log when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
