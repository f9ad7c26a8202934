//! sysoptd - host telemetry and disk forecasting daemon
//!
//! Samples the host continuously, records one disk snapshot per configured
//! interval and serves health, metrics and read-only views over HTTP.

use anyhow::Result;
use std::sync::Arc;
use sysopt_core::{
    CoreConfig, CoreContext, DiskForecaster, EventLogger, OptimizationEngine, ResourceRegistry,
    TelemetryCollector,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod tasks;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting sysoptd");

    let config = CoreConfig::load();
    let port = config.api_port;
    let volume = config.primary_volume();
    let snapshot_every = config.snapshot_interval();
    let drain_every = config.sampling_interval();
    info!(
        interval_secs = config.monitoring_interval,
        volume = %volume.display(),
        port,
        "Daemon configured"
    );

    let ctx = CoreContext::new(config);
    let logger = EventLogger::local();
    logger.log_startup(AGENT_VERSION);

    let collector = Arc::new(TelemetryCollector::new(&ctx));
    let engine = Arc::new(OptimizationEngine::new(&ctx));
    let forecaster = Arc::new(DiskForecaster::new(&ctx));

    let registry = ResourceRegistry::new();
    registry.register(collector.clone());
    registry.register(engine.clone());

    collector.start();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let latest = tasks::LatestMetric::default();

    let drain_handle = tokio::spawn(tasks::drain_metrics(
        collector.clone(),
        latest.clone(),
        drain_every,
        shutdown_tx.subscribe(),
    ));
    let snapshot_handle = tokio::spawn(tasks::record_snapshots(
        forecaster.clone(),
        volume,
        snapshot_every,
        shutdown_tx.subscribe(),
    ));

    let app_state = Arc::new(api::AppState {
        collector,
        engine,
        forecaster,
        latest,
    });
    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(api::serve(port, app_state, async move {
        let _ = api_shutdown.recv().await;
    }));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    for handle in [drain_handle, snapshot_handle] {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server failed"),
        Err(e) => warn!(error = %e, "API server task ended abnormally"),
        Ok(Ok(())) => {}
    }

    let failures = registry.shutdown_all().await;
    info!(failures, "Shut down");

    Ok(())
}
