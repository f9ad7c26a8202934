//! Disk-space forecaster
//!
//! Turns the persisted [`DiskSnapshot`] series into a [`Forecast`].
//! [`DiskForecaster::predict_exhaustion`] records a fresh snapshot first, so
//! the series grows by one point per call; [`DiskForecaster::forecast`] only
//! reads it. Predictions are recomputed on demand and never cached.
//!
//! The store is read-modify-write from a single writer. Two forecasters
//! pointed at the same file will overwrite each other's appends.

mod folders;
mod growth;
mod store;

pub use folders::{is_safe_to_clean, FolderRanking};
pub use growth::{endpoint_rate, growth_rate, least_squares_rate};
pub use store::{SnapshotStore, DEFAULT_SNAPSHOT_CAPACITY};

use crate::config::GrowthEstimator;
use crate::context::CoreContext;
use crate::models::{round_to, DiskSnapshot, Forecast, GrowingDirectory, Prediction, WarningTier};
use crate::observability::{CoreMetrics, EventLogger};
use crate::platform::{Clock, HostProbe};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const INSUFFICIENT_DATA: &str = "Insufficient historical data (need at least 2 snapshots)";
const STABLE: &str = "Disk usage is stable or decreasing";

/// Predicts when a volume fills up from its recorded usage history
pub struct DiskForecaster {
    store: Mutex<SnapshotStore>,
    probe: Arc<dyn HostProbe>,
    clock: Arc<dyn Clock>,
    metrics: CoreMetrics,
    logger: EventLogger,
    estimator: GrowthEstimator,
    ranking: FolderRanking,
}

impl DiskForecaster {
    /// Forecaster over the configured history file
    pub fn new(ctx: &CoreContext) -> Self {
        Self::with_store_path(ctx, ctx.config.history_path())
    }

    pub fn with_store_path(ctx: &CoreContext, path: impl Into<PathBuf>) -> Self {
        let config = &ctx.config;
        let (store, load_err) = SnapshotStore::open(path, config.snapshot_capacity);
        if load_err.is_some() {
            ctx.metrics.inc_persist_errors();
        }

        Self {
            store: Mutex::new(store),
            probe: Arc::clone(&ctx.probe),
            clock: Arc::clone(&ctx.clock),
            metrics: ctx.metrics.clone(),
            logger: EventLogger::local(),
            estimator: config.growth_estimator,
            ranking: FolderRanking::platform_default(
                config.folder_scan_depth,
                config.large_folder_threshold_gb,
                config.top_folders,
            ),
        }
    }

    /// Replace the directories considered for the growing-directory ranking
    pub fn with_ranking(mut self, ranking: FolderRanking) -> Self {
        self.ranking = ranking;
        self
    }

    fn store(&self) -> MutexGuard<'_, SnapshotStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sample `volume`, append the reading and persist the series.
    ///
    /// Sampling and persistence failures are logged, never returned. A failed
    /// write still leaves the reading in the in-memory series.
    pub fn record_snapshot(&self, volume: &Path) -> Option<DiskSnapshot> {
        let usage = match self.probe.volume_usage(volume) {
            Ok(usage) => usage,
            Err(e) => {
                warn!(volume = %volume.display(), error = %e, "Failed to sample disk usage, snapshot skipped");
                return None;
            }
        };

        let snapshot = DiskSnapshot::from_usage(self.clock.now(), &usage);
        let mut store = self.store();
        if let Err(e) = store.append(snapshot.clone()) {
            warn!(path = %store.path().display(), error = %e, "Failed to persist disk history");
            self.metrics.inc_persist_errors();
        }
        debug!(volume = %volume.display(), used_gb = snapshot.used_gb, entries = store.len(), "Disk snapshot recorded");
        Some(snapshot)
    }

    /// Record a snapshot of `volume`, then forecast from the whole series
    pub fn predict_exhaustion(&self, volume: &Path) -> Forecast {
        self.record_snapshot(volume);
        self.forecast()
    }

    /// Forecast from the series as recorded so far, without sampling
    pub fn forecast(&self) -> Forecast {
        let series = self.store().snapshots();

        let forecast = match series.last() {
            Some(current) if series.len() >= 2 => {
                let rate = growth_rate(self.estimator, &series);
                Forecast::Ready(self.predict(rate, current))
            }
            _ => Forecast::InsufficientData {
                reason: INSUFFICIENT_DATA.to_string(),
                days_of_data: series.len(),
            },
        };

        let days = match &forecast {
            Forecast::Ready(prediction) => prediction.days_until_full,
            Forecast::InsufficientData { .. } => None,
        };
        self.metrics.set_days_until_full(days);
        self.logger.log_forecast(&forecast);
        forecast
    }

    fn predict(&self, rate: f64, current: &DiskSnapshot) -> Prediction {
        if rate <= 0.0 {
            return Prediction {
                growth_rate_gb_per_day: round_to(rate, 3),
                disk_growing: false,
                days_until_full: None,
                current_free_gb: current.free_gb,
                current_used_percent: current.percent_used,
                warning_tier: WarningTier::Ok,
                growing_directories: Vec::new(),
                recommendation: STABLE.to_string(),
            };
        }

        let days = current.free_gb / rate;
        let tier = WarningTier::from_days(days);
        let growing = self.ranking.rank();

        Prediction {
            growth_rate_gb_per_day: round_to(rate, 3),
            disk_growing: true,
            days_until_full: Some(round_to(days, 1)),
            current_free_gb: current.free_gb,
            current_used_percent: current.percent_used,
            warning_tier: tier,
            recommendation: recommendation(tier, days, growing.first()),
            growing_directories: growing,
        }
    }

    /// (timestamp, used GB) pairs, oldest first
    pub fn historical_trend(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.store()
            .snapshots()
            .into_iter()
            .map(|s| (s.timestamp, s.used_gb))
            .collect()
    }

    pub fn snapshots(&self) -> Vec<DiskSnapshot> {
        self.store().snapshots()
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }
}

fn recommendation(tier: WarningTier, days: f64, largest: Option<&GrowingDirectory>) -> String {
    let whole_days = days.floor() as u64;
    let review = largest
        .map(|dir| format!(" Review {} ({}GB).", dir.path.display(), dir.size_gb))
        .unwrap_or_default();

    match tier {
        WarningTier::Critical => format!(
            "URGENT: Disk will be full in {whole_days} days! Clean up large files immediately.{review}"
        ),
        WarningTier::Warning => format!("Disk will be full in {whole_days} days.{review}"),
        WarningTier::Info => format!(
            "Disk space is adequate for {whole_days} days. Monitor usage regularly."
        ),
        WarningTier::Ok => "Disk space is healthy. No immediate action needed.".to_string(),
    }
}
