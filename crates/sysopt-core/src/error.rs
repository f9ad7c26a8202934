//! Error types for the optimizer core
//!
//! Errors are split by how a caller is expected to react:
//! - [`SampleError`]: transient telemetry failures, retried by the collector
//! - [`ActionError`]: a single cleanup action failed, the batch continues
//! - [`ExecutionError`]: the whole execution run did not happen or was abandoned
//! - [`StoreError`]: disk-history persistence failures, logged and skipped

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to read a host sample
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no mounted volume contains {0}")]
    UnknownVolume(PathBuf),

    #[error("sampling task failed: {0}")]
    Task(String),

    #[error("probe error: {0}")]
    Probe(String),
}

/// Failure of a single optimization action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Cannot delete {}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Cannot delete {}: permission denied", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Refusing to delete {}: outside scanned locations", path.display())]
    OutsideScanRoots { path: PathBuf },

    #[error("Cannot delete {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ActionError {
    /// Classify an I/O error raised while acting on `path`
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => ActionError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => ActionError::PermissionDenied { path },
            _ => ActionError::Io { path, source },
        }
    }
}

/// Execution-level failure, distinct from per-action errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("no execution worker became available within {waited:?}")]
    PoolExhausted { waited: Duration },

    #[error("execution did not finish within {0:?}")]
    Timeout(Duration),

    #[error("execution pool is shut down")]
    PoolClosed,

    #[error("execution worker failed: {0}")]
    WorkerFailed(String),
}

/// Disk-history persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("disk history I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("disk history encoding error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_action_error_classification() {
        let not_found = ActionError::from_io("/tmp/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(not_found, ActionError::NotFound { .. }));

        let denied =
            ActionError::from_io("/tmp/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, ActionError::PermissionDenied { .. }));
        assert_eq!(denied.to_string(), "Cannot delete /tmp/x: permission denied");

        let other = ActionError::from_io("/tmp/x", io::Error::new(io::ErrorKind::Other, "busy"));
        assert!(matches!(other, ActionError::Io { .. }));
        assert!(other.to_string().contains("busy"));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "execution did not finish within 3s");
    }
}
