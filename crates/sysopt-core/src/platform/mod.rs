//! Platform abstraction
//!
//! Everything the core needs from the operating system goes through the
//! traits in this module so the subsystems can run against fakes in tests:
//! - [`HostProbe`] samples CPU, memory, disk, network and process counts
//! - [`PlatformHooks`] holds best-effort OS hooks such as working-set trimming
//! - [`FileOps`] performs the destructive filesystem calls
//! - [`Clock`] supplies wall-clock time

mod hooks;
mod sysinfo_probe;

pub use hooks::{NoopHooks, ProcessHooks};
pub use sysinfo_probe::SysinfoProbe;

use crate::error::SampleError;
use crate::models::{Metric, StaticInfo, VolumeUsage};
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Source of host resource readings
pub trait HostProbe: Send + Sync {
    /// Take one full sample for the given volumes
    fn sample(&self, volumes: &[PathBuf]) -> Result<Metric, SampleError>;

    /// Facts computed once per process
    fn static_info(&self) -> StaticInfo;

    /// Current usage of the volume containing `path`
    fn volume_usage(&self, path: &Path) -> Result<VolumeUsage, SampleError>;

    /// Current memory usage percentage
    fn memory_percent(&self) -> Result<f32, SampleError>;
}

/// Best-effort OS hooks; callers never assume a hook succeeded
pub trait PlatformHooks: Send + Sync {
    /// Ask the OS to reclaim memory. Returns whether anything was attempted.
    fn trim_memory(&self) -> bool {
        false
    }
}

/// Filesystem effects used by the executor
pub trait FileOps: Send + Sync {
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` backed file operations
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pick the volume whose mount point is the longest prefix of `path`
pub(crate) fn containing_volume<'a>(
    path: &Path,
    volumes: impl IntoIterator<Item = &'a VolumeUsage>,
) -> Option<&'a VolumeUsage> {
    volumes
        .into_iter()
        .filter(|v| path.starts_with(&v.mount_point))
        .max_by_key(|v| v.mount_point.components().count())
}
