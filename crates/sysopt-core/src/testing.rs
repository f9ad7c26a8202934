//! Fakes shared by unit tests

use crate::error::SampleError;
use crate::models::{Metric, StaticInfo, VolumeUsage, BYTES_PER_GB};
use crate::platform::{Clock, HostProbe, PlatformHooks};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Probe returning scripted readings
pub struct FakeProbe {
    pub memory_percent: Mutex<f32>,
    pub volume: Mutex<VolumeUsage>,
    pub fail: AtomicBool,
    pub samples: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self {
            memory_percent: Mutex::new(40.0),
            volume: Mutex::new(VolumeUsage::new(
                PathBuf::from("/"),
                (100.0 * BYTES_PER_GB) as u64,
                (50.0 * BYTES_PER_GB) as u64,
            )),
            fail: AtomicBool::new(false),
            samples: AtomicUsize::new(0),
        }
    }

    pub fn with_memory(percent: f32) -> Self {
        let probe = Self::new();
        *probe.memory_percent.lock().unwrap() = percent;
        probe
    }

    /// Set the primary volume to `used_gb` out of `used_gb + free_gb`
    pub fn set_disk_gb(&self, used_gb: f64, free_gb: f64) {
        *self.volume.lock().unwrap() = VolumeUsage::new(
            PathBuf::from("/"),
            ((used_gb + free_gb) * BYTES_PER_GB) as u64,
            (free_gb * BYTES_PER_GB) as u64,
        );
    }
}

impl HostProbe for FakeProbe {
    fn sample(&self, _volumes: &[PathBuf]) -> Result<Metric, SampleError> {
        let n = self.samples.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SampleError::Probe("scripted failure".to_string()));
        }
        Ok(metric(n))
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            logical_cores: 8,
            physical_cores: Some(4),
            total_memory_bytes: 16 * 1024 * 1024 * 1024,
            boot_time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn volume_usage(&self, _path: &Path) -> Result<VolumeUsage, SampleError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SampleError::Probe("scripted failure".to_string()));
        }
        Ok(self.volume.lock().unwrap().clone())
    }

    fn memory_percent(&self) -> Result<f32, SampleError> {
        Ok(*self.memory_percent.lock().unwrap())
    }
}

/// Build a metric whose process count identifies it
pub fn metric(n: usize) -> Metric {
    Metric {
        timestamp: Utc::now(),
        cpu_percent: (n % 100) as f32,
        cpu_per_core: vec![(n % 100) as f32; 4],
        memory_percent: 50.0,
        memory_used_bytes: 1024,
        memory_available_bytes: 1024,
        volumes: vec![VolumeUsage::new(PathBuf::from("/"), 100, 40)],
        net_sent_bytes: n as u64 * 10,
        net_recv_bytes: n as u64 * 20,
        process_count: n,
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::days(days);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hooks that count invocations
#[derive(Default)]
pub struct CountingHooks {
    pub calls: AtomicUsize,
}

impl PlatformHooks for CountingHooks {
    fn trim_memory(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}
