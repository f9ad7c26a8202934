//! Core configuration
//!
//! Read-only for the core: values come from `SYSOPT_*` environment variables,
//! an optional JSON file, and the defaults below, in that order of precedence.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Directory under the user's home that holds config and disk history
pub const DATA_DIR_NAME: &str = ".sysopt";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SYSOPT";

const MIN_MONITORING_INTERVAL_SECS: f64 = 0.1;

/// How the forecaster estimates daily disk growth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthEstimator {
    /// First and last snapshot only
    #[default]
    Endpoint,
    /// Ordinary least squares over every snapshot
    LeastSquares,
}

/// Configuration shared by the collector, optimizer and forecaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Seconds between telemetry samples
    #[serde(default = "default_monitoring_interval")]
    pub monitoring_interval: f64,

    /// Points kept per rolling history window
    #[serde(default = "default_history_points")]
    pub graph_history_points: usize,

    /// Capacity of the metric hand-off queue
    #[serde(default = "default_queue_capacity")]
    pub metric_queue_capacity: usize,

    /// Volumes sampled on every tick; the first one feeds the disk history
    #[serde(default = "default_monitored_volumes")]
    pub monitored_volumes: Vec<PathBuf>,

    #[serde(default = "default_temp_file_age_days")]
    pub temp_file_age_days: u64,

    #[serde(default = "default_true")]
    pub cleanup_temp_files: bool,

    #[serde(default = "default_true")]
    pub memory_cleanup: bool,

    #[serde(default = "default_true")]
    pub browser_cache_cleanup: bool,

    /// Memory usage above which a memory optimization is proposed
    #[serde(default = "default_memory_pressure_percent")]
    pub memory_pressure_percent: f32,

    #[serde(default = "default_browser_cache_threshold_mb")]
    pub browser_cache_threshold_mb: u64,

    #[serde(default = "default_max_scan_files")]
    pub max_scan_files: usize,

    #[serde(default = "default_max_files_per_directory")]
    pub max_files_per_directory: usize,

    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// How long an execution waits for a free worker before giving up
    #[serde(default = "default_pool_acquire_timeout_secs")]
    pub pool_acquire_timeout_secs: u64,

    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,

    /// Disk history file; defaults to `~/.sysopt/disk_history.json`
    #[serde(default)]
    pub disk_history_path: Option<PathBuf>,

    #[serde(default)]
    pub growth_estimator: GrowthEstimator,

    #[serde(default = "default_folder_scan_depth")]
    pub folder_scan_depth: usize,

    #[serde(default = "default_large_folder_threshold_gb")]
    pub large_folder_threshold_gb: f64,

    #[serde(default = "default_top_folders")]
    pub top_folders: usize,

    /// Seconds between disk snapshots recorded by the daemon
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    /// Daemon HTTP port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_monitoring_interval() -> f64 {
    2.0
}

fn default_history_points() -> usize {
    60
}

fn default_queue_capacity() -> usize {
    100
}

fn default_monitored_volumes() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![PathBuf::from("C:\\")]
    } else {
        vec![PathBuf::from("/")]
    }
}

fn default_temp_file_age_days() -> u64 {
    7
}

fn default_true() -> bool {
    true
}

fn default_memory_pressure_percent() -> f32 {
    70.0
}

fn default_browser_cache_threshold_mb() -> u64 {
    100
}

fn default_max_scan_files() -> usize {
    100
}

fn default_max_files_per_directory() -> usize {
    50
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_pool_acquire_timeout_secs() -> u64 {
    30
}

fn default_snapshot_capacity() -> usize {
    90
}

fn default_folder_scan_depth() -> usize {
    6
}

fn default_large_folder_threshold_gb() -> f64 {
    1.0
}

fn default_top_folders() -> usize {
    5
}

fn default_snapshot_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_api_port() -> u16 {
    9595
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            monitoring_interval: default_monitoring_interval(),
            graph_history_points: default_history_points(),
            metric_queue_capacity: default_queue_capacity(),
            monitored_volumes: default_monitored_volumes(),
            temp_file_age_days: default_temp_file_age_days(),
            cleanup_temp_files: true,
            memory_cleanup: true,
            browser_cache_cleanup: true,
            memory_pressure_percent: default_memory_pressure_percent(),
            browser_cache_threshold_mb: default_browser_cache_threshold_mb(),
            max_scan_files: default_max_scan_files(),
            max_files_per_directory: default_max_files_per_directory(),
            worker_pool_size: default_worker_pool_size(),
            pool_acquire_timeout_secs: default_pool_acquire_timeout_secs(),
            snapshot_capacity: default_snapshot_capacity(),
            disk_history_path: None,
            growth_estimator: GrowthEstimator::default(),
            folder_scan_depth: default_folder_scan_depth(),
            large_folder_threshold_gb: default_large_folder_threshold_gb(),
            top_folders: default_top_folders(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            api_port: default_api_port(),
        }
    }
}

impl CoreConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Self {
        let path = data_dir().map(|dir| dir.join("config.json"));
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file (if any) and the environment.
    ///
    /// Never fails: an unreadable or malformed source falls back to defaults.
    pub fn load_from(path: Option<&Path>) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                debug!(path = ?path, "Configuration loaded");
                config
            }
            Err(e) => {
                warn!(error = %e, path = ?path, "Failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    fn try_load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Sampling interval, clamped to a small positive minimum
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitoring_interval.max(MIN_MONITORING_INTERVAL_SECS))
    }

    pub fn pool_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_acquire_timeout_secs)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs.max(1))
    }

    pub fn primary_volume(&self) -> PathBuf {
        self.monitored_volumes
            .first()
            .cloned()
            .unwrap_or_else(|| default_monitored_volumes().remove(0))
    }

    /// Resolved disk history location
    pub fn history_path(&self) -> PathBuf {
        self.disk_history_path.clone().unwrap_or_else(|| {
            data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("disk_history.json")
        })
    }
}

/// `~/.sysopt`, if a home directory can be determined
pub fn data_dir() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(DATA_DIR_NAME))
}
