//! Host resource telemetry and optimization engine
//!
//! This crate provides the core functionality for:
//! - Background resource sampling with bounded queue and rolling history
//! - Two-phase cleanup planning and asynchronous execution
//! - Disk exhaustion forecasting from a persisted usage series
//! - Configuration, lifecycle and observability shared by the binaries

pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod fsutil;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod optimizer;
pub mod platform;

#[cfg(test)]
mod testing;

pub use collector::{StopOutcome, TelemetryCollector};
pub use config::{CoreConfig, GrowthEstimator};
pub use context::CoreContext;
pub use error::{ActionError, ExecutionError, SampleError, StoreError};
pub use forecast::DiskForecaster;
pub use lifecycle::{ResourceRegistry, Shutdownable};
pub use models::*;
pub use observability::{CoreMetrics, EventLogger};
pub use optimizer::{ExecutionHandle, OptimizationEngine, ProgressSink, ProgressUpdate};
