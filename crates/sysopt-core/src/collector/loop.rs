//! Background sampling loop
//!
//! Samples the host on a fixed cadence, folds each reading into the rolling
//! history and hands it to consumers through the bounded queue. Sampling
//! errors are logged and followed by a short back-off; they never end the loop.

use super::history::ResourceHistory;
use super::queue::MetricQueue;
use crate::error::SampleError;
use crate::models::{HistorySnapshot, Metric};
use crate::observability::CoreMetrics;
use crate::platform::HostProbe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// State written by the sampling task and read by consumers.
///
/// Readers only ever receive copies.
#[derive(Debug)]
pub(crate) struct SharedState {
    queue: Mutex<MetricQueue>,
    history: Mutex<ResourceHistory>,
    sample_errors: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedState {
    pub(crate) fn new(queue_capacity: usize, history_capacity: usize) -> Self {
        Self {
            queue: Mutex::new(MetricQueue::new(queue_capacity)),
            history: Mutex::new(ResourceHistory::new(history_capacity)),
            sample_errors: AtomicU64::new(0),
        }
    }

    /// Fold a fresh reading into history and enqueue it
    pub(crate) fn record(&self, metric: Metric, metrics: &CoreMetrics) {
        lock(&self.history).record(&metric);

        let mut queue = lock(&self.queue);
        if let Some(dropped) = queue.push(metric) {
            debug!(
                dropped_at = %dropped.timestamp,
                "Metric queue full, dropped oldest unread sample"
            );
            metrics.inc_queue_dropped();
        }
        metrics.set_queue_depth(queue.len());
    }

    pub(crate) fn poll(&self) -> Option<Metric> {
        lock(&self.queue).pop()
    }

    pub(crate) fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }

    pub(crate) fn history(&self) -> HistorySnapshot {
        lock(&self.history).snapshot()
    }

    pub(crate) fn record_error(&self) {
        self.sample_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sample_errors(&self) -> u64 {
        self.sample_errors.load(Ordering::Relaxed)
    }
}

/// The sampling task body
pub(crate) struct SamplingLoop {
    pub(crate) probe: Arc<dyn HostProbe>,
    pub(crate) shared: Arc<SharedState>,
    pub(crate) metrics: CoreMetrics,
    pub(crate) volumes: Vec<PathBuf>,
    pub(crate) interval: Duration,
    pub(crate) error_backoff: Duration,
}

impl SamplingLoop {
    pub(crate) async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting telemetry sampling loop"
        );

        let mut ticker = interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick_count += 1;
                    if let Err(e) = self.sample_once().await {
                        warn!(error = %e, "Sampling failed, backing off");
                        self.shared.record_error();
                        self.metrics.inc_sample_errors();

                        tokio::select! {
                            _ = sleep(self.error_backoff) => {}
                            _ = shutdown.recv() => break,
                        }
                        ticker.reset();
                    }

                    if tick_count % 30 == 0 {
                        debug!(
                            ticks = tick_count,
                            errors = self.shared.sample_errors(),
                            queued = self.shared.queue_len(),
                            "Sampling loop heartbeat"
                        );
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        info!(ticks = tick_count, "Telemetry sampling loop stopped");
    }

    async fn sample_once(&self) -> Result<(), SampleError> {
        let start = Instant::now();
        let probe = Arc::clone(&self.probe);
        let volumes = self.volumes.clone();

        let metric = tokio::task::spawn_blocking(move || probe.sample(&volumes))
            .await
            .map_err(|e| SampleError::Task(e.to_string()))??;

        self.metrics.observe_sample(
            start.elapsed().as_secs_f64(),
            metric.cpu_percent,
            metric.memory_percent,
            metric.primary_disk_percent(),
        );
        self.shared.record(metric, &self.metrics);
        Ok(())
    }
}
