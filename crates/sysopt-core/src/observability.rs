//! Observability infrastructure for the optimizer core
//!
//! Provides:
//! - Prometheus metrics (sampling latency, queue pressure, cleanup results, forecasts)
//! - Structured event logging with tracing

use crate::models::{ActionPlan, ExecutionResult, Forecast};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for sampling latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CoreMetricsInner> = OnceLock::new();

struct CoreMetricsInner {
    sample_latency_seconds: Histogram,
    samples_total: IntCounter,
    sample_errors_total: IntCounter,
    queue_dropped_total: IntCounter,
    queue_depth: IntGauge,
    cpu_percent: Gauge,
    memory_percent: Gauge,
    disk_percent: Gauge,
    executions_total: IntCounter,
    bytes_freed_total: IntCounter,
    action_errors_total: IntCounter,
    days_until_full: Gauge,
    persist_errors_total: IntCounter,
}

impl CoreMetricsInner {
    fn new() -> Self {
        Self {
            sample_latency_seconds: register_histogram!(
                "sysopt_sample_latency_seconds",
                "Time spent taking one host sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            samples_total: register_int_counter!(
                "sysopt_samples_total",
                "Total number of host samples taken"
            )
            .expect("Failed to register samples_total"),

            sample_errors_total: register_int_counter!(
                "sysopt_sample_errors_total",
                "Total number of failed host samples"
            )
            .expect("Failed to register sample_errors_total"),

            queue_dropped_total: register_int_counter!(
                "sysopt_queue_dropped_total",
                "Metrics evicted from the hand-off queue before being read"
            )
            .expect("Failed to register queue_dropped_total"),

            queue_depth: register_int_gauge!(
                "sysopt_queue_depth",
                "Metrics currently waiting in the hand-off queue"
            )
            .expect("Failed to register queue_depth"),

            cpu_percent: register_gauge!("sysopt_cpu_percent", "Latest aggregate CPU usage")
                .expect("Failed to register cpu_percent"),

            memory_percent: register_gauge!("sysopt_memory_percent", "Latest memory usage")
                .expect("Failed to register memory_percent"),

            disk_percent: register_gauge!(
                "sysopt_disk_percent",
                "Latest usage of the primary monitored volume"
            )
            .expect("Failed to register disk_percent"),

            executions_total: register_int_counter!(
                "sysopt_executions_total",
                "Total number of optimization runs completed"
            )
            .expect("Failed to register executions_total"),

            bytes_freed_total: register_int_counter!(
                "sysopt_bytes_freed_total",
                "Bytes reclaimed by optimization runs"
            )
            .expect("Failed to register bytes_freed_total"),

            action_errors_total: register_int_counter!(
                "sysopt_action_errors_total",
                "Optimization actions that failed"
            )
            .expect("Failed to register action_errors_total"),

            days_until_full: register_gauge!(
                "sysopt_days_until_full",
                "Predicted days until the forecast volume is full (-1 if not growing)"
            )
            .expect("Failed to register days_until_full"),

            persist_errors_total: register_int_counter!(
                "sysopt_disk_history_errors_total",
                "Disk history load/save failures"
            )
            .expect("Failed to register persist_errors_total"),
        }
    }
}

/// Metrics handle for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct CoreMetrics {
    _private: (),
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CoreMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CoreMetricsInner {
        GLOBAL_METRICS.get_or_init(CoreMetricsInner::new)
    }

    pub fn observe_sample(&self, duration_secs: f64, cpu: f32, memory: f32, disk: f32) {
        let inner = self.inner();
        inner.sample_latency_seconds.observe(duration_secs);
        inner.samples_total.inc();
        inner.cpu_percent.set(cpu as f64);
        inner.memory_percent.set(memory as f64);
        inner.disk_percent.set(disk as f64);
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors_total.inc();
    }

    pub fn inc_queue_dropped(&self) {
        self.inner().queue_dropped_total.inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.inner().queue_depth.set(depth as i64);
    }

    pub fn record_execution(&self, result: &ExecutionResult) {
        let inner = self.inner();
        inner.executions_total.inc();
        inner.bytes_freed_total.inc_by(result.bytes_freed);
        inner.action_errors_total.inc_by(result.errors.len() as u64);
    }

    pub fn set_days_until_full(&self, days: Option<f64>) {
        self.inner().days_until_full.set(days.unwrap_or(-1.0));
    }

    pub fn inc_persist_errors(&self) {
        self.inner().persist_errors_total.inc();
    }
}

/// Structured logger for significant optimizer events
#[derive(Clone)]
pub struct EventLogger {
    host: String,
}

impl EventLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Logger tagged with this machine's host name
    pub fn local() -> Self {
        Self::new(sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()))
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "optimizer_started",
            host = %self.host,
            version = %version,
            "System optimizer started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "optimizer_shutdown",
            host = %self.host,
            reason = %reason,
            "System optimizer shutting down"
        );
    }

    pub fn log_plan(&self, plan: &ActionPlan) {
        info!(
            event = "plan_ready",
            host = %self.host,
            actions = plan.actions.len(),
            files = plan.total_files,
            total_mb = plan.total_size_mb(),
            categories = plan.categories.len(),
            "Optimization plan ready"
        );
    }

    pub fn log_execution(&self, result: &ExecutionResult) {
        if result.errors.is_empty() {
            info!(
                event = "execution_finished",
                host = %self.host,
                files_deleted = result.files_deleted,
                freed_mb = result.space_freed_mb(),
                "Optimization run finished"
            );
        } else {
            warn!(
                event = "execution_finished",
                host = %self.host,
                files_deleted = result.files_deleted,
                freed_mb = result.space_freed_mb(),
                errors = result.errors.len(),
                "Optimization run finished with errors"
            );
        }
    }

    pub fn log_forecast(&self, forecast: &Forecast) {
        match forecast {
            Forecast::Ready(prediction) => info!(
                event = "forecast_ready",
                host = %self.host,
                growth_gb_per_day = prediction.growth_rate_gb_per_day,
                days_until_full = ?prediction.days_until_full,
                tier = %prediction.warning_tier,
                "Disk forecast computed"
            ),
            Forecast::InsufficientData { days_of_data, .. } => info!(
                event = "forecast_ready",
                host = %self.host,
                days_of_data = *days_of_data,
                "Not enough disk history for a forecast"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_metrics_handles_share_registry() {
        let a = CoreMetrics::new();
        let b = a.clone();

        a.observe_sample(0.01, 12.5, 40.0, 55.0);
        b.inc_sample_errors();
        a.inc_queue_dropped();
        b.set_queue_depth(3);
        a.record_execution(&ExecutionResult {
            files_deleted: 2,
            bytes_freed: 2048,
            errors: vec!["x".to_string()],
            actions_completed: vec![],
        });
        b.set_days_until_full(None);
        a.inc_persist_errors();

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"sysopt_samples_total".to_string()));
        assert!(names.contains(&"sysopt_queue_depth".to_string()));
    }

    #[test]
    fn test_event_logger_creation() {
        let logger = EventLogger::new("test-host");
        assert_eq!(logger.host, "test-host");
    }
}
