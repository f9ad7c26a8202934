//! Persisted disk snapshot series
//!
//! The whole series lives in one JSON array that is loaded in full on open and
//! rewritten in full on every append. Writes go to a sibling temp file that is
//! renamed over the original so a crash mid-write never leaves a torn file.

use crate::error::StoreError;
use crate::models::DiskSnapshot;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default number of retained snapshots (about 90 days at one per day)
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 90;

/// Capped, timestamp-ordered snapshot series backed by a file
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    capacity: usize,
    series: VecDeque<DiskSnapshot>,
}

impl SnapshotStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty series. An unreadable or malformed file is
    /// reported through the returned error slot and also yields an empty
    /// series, so opening never fails.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> (Self, Option<StoreError>) {
        let mut store = Self {
            path: path.into(),
            capacity: capacity.max(1),
            series: VecDeque::new(),
        };

        let err = match store.load() {
            Ok(()) => None,
            Err(e) => {
                warn!(path = %store.path.display(), error = %e, "Failed to load disk history, starting empty");
                store.series.clear();
                Some(e)
            }
        };
        (store, err)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let mut snapshots: Vec<DiskSnapshot> = serde_json::from_slice(&data)?;
        snapshots.sort_by_key(|s| s.timestamp);
        let skip = snapshots.len().saturating_sub(self.capacity);
        self.series = snapshots.into_iter().skip(skip).collect();

        debug!(path = %self.path.display(), entries = self.series.len(), "Loaded disk history");
        Ok(())
    }

    /// Append `snapshot`, evicting the oldest entry at capacity, then persist.
    ///
    /// The in-memory series is updated even when the write fails.
    pub fn append(&mut self, snapshot: DiskSnapshot) -> Result<(), StoreError> {
        while self.series.len() >= self.capacity {
            self.series.pop_front();
        }
        self.series.push_back(snapshot);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let data = serde_json::to_vec(&self.series)?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(&data).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Copy of the series, oldest first
    pub fn snapshots(&self) -> Vec<DiskSnapshot> {
        self.series.iter().cloned().collect()
    }

    pub fn first(&self) -> Option<&DiskSnapshot> {
        self.series.front()
    }

    pub fn last(&self) -> Option<&DiskSnapshot> {
        self.series.back()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
