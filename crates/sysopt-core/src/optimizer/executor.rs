//! Execution phase: applies a batch of approved actions
//!
//! One failing action never aborts the batch; its error is recorded and the
//! next action runs. Progress is pushed to a caller-supplied sink after each
//! dispatch and a terminal 100% update is always sent.

use super::scanner::{is_scanned_path, ScanRoots};
use crate::error::{ActionError, ExecutionError};
use crate::models::{ExecutionResult, OptimizationAction};
use crate::platform::{FileOps, PlatformHooks};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Category reported with the terminal progress update
pub const COMPLETE: &str = "complete";

/// One progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 0..=100
    pub percent: u8,
    pub category: String,
    /// Set only on the final update of a run
    pub terminal: bool,
}

/// Receives progress from the worker thread running a batch
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

impl ProgressSink for mpsc::UnboundedSender<ProgressUpdate> {
    fn report(&self, update: ProgressUpdate) {
        // The receiver going away just means nobody is watching any more.
        let _ = self.send(update);
    }
}

/// Handle to an execution running off the calling thread
pub struct ExecutionHandle {
    inner: JoinHandle<Result<ExecutionResult, ExecutionError>>,
}

impl ExecutionHandle {
    pub(crate) fn new(inner: JoinHandle<Result<ExecutionResult, ExecutionError>>) -> Self {
        Self { inner }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the run to finish
    pub async fn wait(self) -> Result<ExecutionResult, ExecutionError> {
        match self.inner.await {
            Ok(outcome) => outcome,
            Err(e) => Err(ExecutionError::WorkerFailed(e.to_string())),
        }
    }

    /// Wait at most `limit`. On timeout the run keeps going and the handle
    /// can be waited on again.
    pub async fn wait_timeout(&mut self, limit: Duration) -> Result<ExecutionResult, ExecutionError> {
        match tokio::time::timeout(limit, &mut self.inner).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(ExecutionError::WorkerFailed(e.to_string())),
            Err(_) => Err(ExecutionError::Timeout(limit)),
        }
    }
}

/// Apply `actions` in order. Runs on a blocking worker thread.
pub(crate) fn run_batch(
    actions: Vec<OptimizationAction>,
    roots: &ScanRoots,
    files: &dyn FileOps,
    hooks: &dyn PlatformHooks,
    sink: &dyn ProgressSink,
) -> ExecutionResult {
    let mut result = ExecutionResult::default();
    let total = actions.len();

    for (index, action) in actions.into_iter().enumerate() {
        sink.report(ProgressUpdate {
            percent: (index * 100 / total) as u8,
            category: action.category.clone(),
            terminal: false,
        });

        if action.is_memory_action() {
            let attempted = hooks.trim_memory();
            debug!(attempted, "Memory optimization hook invoked");
            result.actions_completed.push(action);
            continue;
        }

        let Some(path) = action.target.as_deref() else {
            debug!(category = %action.category, "Action has no target, nothing to do");
            continue;
        };

        match remove_target(path, roots, files) {
            Ok(()) => {
                result.files_deleted += 1;
                result.bytes_freed += action.size_bytes;
                result.actions_completed.push(action);
            }
            Err(e) => {
                debug!(error = %e, "Action failed, continuing with next");
                result.errors.push(e.to_string());
            }
        }
    }

    sink.report(ProgressUpdate {
        percent: 100,
        category: COMPLETE.to_string(),
        terminal: true,
    });

    result
}

fn remove_target(path: &Path, roots: &ScanRoots, files: &dyn FileOps) -> Result<(), ActionError> {
    if !is_scanned_path(roots, path) {
        return Err(ActionError::OutsideScanRoots {
            path: path.to_path_buf(),
        });
    }

    let meta = files
        .metadata(path)
        .map_err(|e| ActionError::from_io(path, e))?;
    let removed = if meta.is_dir() {
        files.remove_dir_all(path)
    } else {
        files.remove_file(path)
    };
    removed.map_err(|e| ActionError::from_io(path, e))
}
