//! Background loops owned by the daemon

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysopt_core::{DiskForecaster, Metric, TelemetryCollector};
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Latest metric drained from the collector queue
pub type LatestMetric = Arc<RwLock<Option<Metric>>>;

/// Drain every queued metric once per `every`, keeping only the newest
pub async fn drain_metrics(
    collector: Arc<TelemetryCollector>,
    latest: LatestMetric,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut newest = None;
                while let Some(metric) = collector.poll() {
                    newest = Some(metric);
                }
                if let Some(metric) = newest {
                    *latest.write().await = Some(metric);
                }
            }
            _ = shutdown.recv() => {
                debug!("Stopping metric drain");
                break;
            }
        }
    }
}

/// Record one disk snapshot of `volume` per `every`, starting immediately
pub async fn record_snapshots(
    forecaster: Arc<DiskForecaster>,
    volume: PathBuf,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(
        volume = %volume.display(),
        interval_secs = every.as_secs(),
        "Starting disk snapshot schedule"
    );
    let mut ticker = interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let forecaster = Arc::clone(&forecaster);
                let volume = volume.clone();
                match tokio::task::spawn_blocking(move || forecaster.record_snapshot(&volume)).await {
                    Ok(Some(snapshot)) => debug!(used_gb = snapshot.used_gb, "Scheduled disk snapshot recorded"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Disk snapshot task failed"),
                }
            }
            _ = shutdown.recv() => {
                info!("Stopping disk snapshot schedule");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{context, ScriptedProbe};
    use sysopt_core::collector::CollectorConfig;

    #[tokio::test]
    async fn test_drain_keeps_newest_metric() {
        let ctx = context(Arc::new(ScriptedProbe::default()));
        let collector = Arc::new(TelemetryCollector::with_config(
            &ctx,
            CollectorConfig {
                interval: Duration::from_millis(5),
                ..Default::default()
            },
        ));
        collector.start();

        let latest: LatestMetric = Arc::default();
        let (tx, rx) = broadcast::channel(1);
        let drain = tokio::spawn(drain_metrics(
            collector.clone(),
            latest.clone(),
            Duration::from_millis(10),
            rx,
        ));

        for _ in 0..200 {
            if latest.read().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(()).unwrap();
        drain.await.unwrap();
        collector.stop().await;

        assert!(latest.read().await.is_some());
        assert_eq!(collector.queued(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_schedule_records_on_first_tick() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(Arc::new(ScriptedProbe::default()));
        let forecaster = Arc::new(DiskForecaster::with_store_path(&ctx, dir.path().join("h.json")));

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(record_snapshots(
            forecaster.clone(),
            PathBuf::from("/"),
            Duration::from_secs(3600),
            rx,
        ));

        for _ in 0..200 {
            if !forecaster.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(forecaster.len(), 1);
    }
}
