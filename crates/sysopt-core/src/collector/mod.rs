//! Telemetry collector
//!
//! Owns one background sampling task, the bounded metric queue and the
//! rolling history windows. Consumers poll without blocking and always
//! receive copies.

mod history;
mod r#loop;
mod queue;

pub use history::{ResourceHistory, RingHistory, DEFAULT_HISTORY_POINTS};
pub use queue::{MetricQueue, DEFAULT_QUEUE_CAPACITY};

use crate::context::CoreContext;
use crate::lifecycle::Shutdownable;
use crate::models::{HistorySnapshot, Metric, StaticInfo};
use crate::observability::CoreMetrics;
use crate::platform::HostProbe;
use async_trait::async_trait;
use r#loop::{SamplingLoop, SharedState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `stop` waits for the sampling task to exit
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed sample before the next attempt
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Collector settings derived from the core configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
    pub queue_capacity: usize,
    pub history_capacity: usize,
    pub volumes: Vec<PathBuf>,
    pub stop_timeout: Duration,
    pub error_backoff: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            history_capacity: DEFAULT_HISTORY_POINTS,
            volumes: vec![PathBuf::from("/")],
            stop_timeout: STOP_TIMEOUT,
            error_backoff: ERROR_BACKOFF,
        }
    }
}

/// How a call to [`TelemetryCollector::stop`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task exited within the timeout
    Stopped,
    /// The task did not exit in time; it was left to finish on its own
    TimedOut,
    /// Nothing was running
    NotRunning,
}

struct RunningTask {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// At most one sampling task exists, including one detached by a timed-out stop
#[derive(Default)]
struct TaskSlot {
    running: Option<RunningTask>,
    stopping: bool,
}

/// Background host sampler
pub struct TelemetryCollector {
    probe: Arc<dyn HostProbe>,
    metrics: CoreMetrics,
    config: CollectorConfig,
    static_info: StaticInfo,
    shared: Arc<SharedState>,
    task: Mutex<TaskSlot>,
}

impl TelemetryCollector {
    /// Build a collector from the shared context; static info is read here, once
    pub fn new(ctx: &CoreContext) -> Self {
        let config = CollectorConfig {
            interval: ctx.config.sampling_interval(),
            queue_capacity: ctx.config.metric_queue_capacity,
            history_capacity: ctx.config.graph_history_points,
            volumes: ctx.config.monitored_volumes.clone(),
            ..Default::default()
        };
        Self::with_config(ctx, config)
    }

    pub fn with_config(ctx: &CoreContext, config: CollectorConfig) -> Self {
        let static_info = ctx.probe.static_info();
        Self {
            probe: Arc::clone(&ctx.probe),
            metrics: ctx.metrics.clone(),
            shared: Arc::new(SharedState::new(
                config.queue_capacity,
                config.history_capacity,
            )),
            config,
            static_info,
            task: Mutex::new(TaskSlot::default()),
        }
    }

    fn task(&self) -> MutexGuard<'_, TaskSlot> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the sampling task. Must be called inside a Tokio runtime.
    ///
    /// Returns `false` without doing anything while a task is alive. That
    /// includes a task left behind by a timed-out [`stop`](Self::stop) until
    /// it has actually exited.
    pub fn start(&self) -> bool {
        let mut slot = self.task();
        if slot.stopping {
            return false;
        }
        if let Some(running) = slot.running.as_ref() {
            if !running.handle.is_finished() {
                return false;
            }
        }

        let (shutdown, rx) = broadcast::channel(1);
        let sampling = SamplingLoop {
            probe: Arc::clone(&self.probe),
            shared: Arc::clone(&self.shared),
            metrics: self.metrics.clone(),
            volumes: self.config.volumes.clone(),
            interval: self.config.interval,
            error_backoff: self.config.error_backoff,
        };
        let handle = tokio::spawn(sampling.run(rx));
        slot.running = Some(RunningTask { shutdown, handle });
        true
    }

    /// Signal the sampling task and wait up to the stop timeout for it to exit.
    ///
    /// This is a best-effort join: on timeout the caller proceeds while the
    /// task finishes its current sample and exits on its own. The handle is
    /// kept, so `start` keeps refusing until that has happened.
    pub async fn stop(&self) -> StopOutcome {
        let mut running = {
            let mut slot = self.task();
            if slot.stopping {
                return StopOutcome::NotRunning;
            }
            let Some(running) = slot.running.take() else {
                return StopOutcome::NotRunning;
            };
            slot.stopping = true;
            running
        };

        // A send error only means the task already dropped its receiver.
        let _ = running.shutdown.send(());

        let outcome = match tokio::time::timeout(self.config.stop_timeout, &mut running.handle).await {
            Ok(Ok(())) => {
                info!("Telemetry collector stopped");
                StopOutcome::Stopped
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Sampling task ended abnormally");
                StopOutcome::Stopped
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.stop_timeout.as_secs_f64(),
                    "Sampling task did not stop in time, leaving it to exit on its own"
                );
                StopOutcome::TimedOut
            }
        };

        let mut slot = self.task();
        slot.stopping = false;
        if outcome == StopOutcome::TimedOut {
            slot.running = Some(running);
        }
        outcome
    }

    pub fn is_running(&self) -> bool {
        self.task()
            .running
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Next queued metric, or `None` if nothing is waiting. Never blocks.
    pub fn poll(&self) -> Option<Metric> {
        let metric = self.shared.poll();
        self.metrics.set_queue_depth(self.shared.queue_len());
        metric
    }

    /// Static host facts captured at construction
    pub fn cached_info(&self) -> StaticInfo {
        self.static_info.clone()
    }

    /// Copies of the rolling history windows
    pub fn history(&self) -> HistorySnapshot {
        self.shared.history()
    }

    pub fn queued(&self) -> usize {
        self.shared.queue_len()
    }

    /// Number of failed samples since construction
    pub fn sample_errors(&self) -> u64 {
        self.shared.sample_errors()
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }
}

#[async_trait]
impl Shutdownable for TelemetryCollector {
    fn name(&self) -> &str {
        "telemetry-collector"
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        match self.stop().await {
            StopOutcome::TimedOut => Err(anyhow::anyhow!(
                "sampling task did not stop within {:?}",
                self.config.stop_timeout
            )),
            StopOutcome::Stopped | StopOutcome::NotRunning => Ok(()),
        }
    }
}
