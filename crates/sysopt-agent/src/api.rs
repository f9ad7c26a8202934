//! HTTP API: health, Prometheus metrics and read-only core views

use crate::tasks::LatestMetric;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use sysopt_core::{DiskForecaster, Metric, OptimizationEngine, StaticInfo, TelemetryCollector};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<TelemetryCollector>,
    pub engine: Arc<OptimizationEngine>,
    pub forecaster: Arc<DiskForecaster>,
    pub latest: LatestMetric,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub collector_running: bool,
    pub sample_errors: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub info: StaticInfo,
    pub latest: Option<Metric>,
    pub queued: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub used_gb: f64,
}

/// 200 while the sampling task runs, 503 once it has stopped
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let running = state.collector.is_running();
    let body = HealthResponse {
        status: if running { "ok" } else { "degraded" }.to_string(),
        collector_running: running,
        sample_errors: state.collector.sample_errors(),
    };
    let code = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        info: state.collector.cached_info(),
        latest: state.latest.read().await.clone(),
        queued: state.collector.queued(),
    })
}

async fn history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.collector.history())
}

/// Runs a fresh read-only analysis. Nothing is executed over HTTP.
async fn plan(State(state): State<Arc<AppState>>) -> Response {
    let engine = Arc::clone(&state.engine);
    blocking_json(move || engine.analyze()).await
}

/// Forecast over the recorded series. Snapshots come only from the
/// background recording task, so repeated requests leave the history as is.
async fn forecast(State(state): State<Arc<AppState>>) -> Response {
    let forecaster = Arc::clone(&state.forecaster);
    blocking_json(move || forecaster.forecast()).await
}

async fn trend(State(state): State<Arc<AppState>>) -> Json<Vec<TrendPoint>> {
    let points = state
        .forecaster
        .historical_trend()
        .into_iter()
        .map(|(timestamp, used_gb)| TrendPoint { timestamp, used_gb })
        .collect();
    Json(points)
}

/// Filesystem-walking calls run on the blocking pool
async fn blocking_json<T, F>(work: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            warn!(error = %e, "Blocking handler failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/history", get(history))
        .route("/api/v1/plan", get(plan))
        .route("/api/v1/forecast", get(forecast))
        .route("/api/v1/trend", get(trend))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
