//! Host probe backed by the `sysinfo` crate
//!
//! Keeps one `System` handle alive between samples so CPU usage is computed
//! over the interval since the previous tick rather than from a cold start.

use super::{containing_volume, Clock, HostProbe, SystemClock};
use crate::error::SampleError;
use crate::models::{round_to, Metric, StaticInfo, VolumeUsage};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind, RefreshKind, System,
};
use tracing::debug;

struct ProbeState {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl ProbeState {
    fn refresh_disks(&mut self) {
        self.disks.refresh();
        if self.disks.list().is_empty() {
            self.disks.refresh_list();
        }
    }

    fn mounted_volumes(&self) -> Vec<VolumeUsage> {
        self.disks
            .list()
            .iter()
            .map(|disk| {
                VolumeUsage::new(
                    disk.mount_point().to_path_buf(),
                    disk.total_space(),
                    disk.available_space(),
                )
            })
            .collect()
    }

    fn memory_percent(&self) -> f32 {
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        let used = total.saturating_sub(self.sys.available_memory());
        round_to(used as f64 / total as f64 * 100.0, 1) as f32
    }
}

/// Default [`HostProbe`] for Linux, macOS and Windows
pub struct SysinfoProbe {
    state: Mutex<ProbeState>,
    static_info: StaticInfo,
    clock: Arc<dyn Clock>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Probe stamping each metric with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let static_info = StaticInfo {
            logical_cores: sys.cpus().len(),
            physical_cores: sys.physical_core_count(),
            total_memory_bytes: sys.total_memory(),
            boot_time: DateTime::<Utc>::from_timestamp(System::boot_time() as i64, 0)
                .unwrap_or_default(),
        };

        Self {
            state: Mutex::new(ProbeState {
                sys,
                disks: Disks::new_with_refreshed_list(),
                networks: Networks::new_with_refreshed_list(),
            }),
            static_info,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn sample(&self, volumes: &[PathBuf]) -> Result<Metric, SampleError> {
        let mut state = self.lock();

        state.sys.refresh_cpu_usage();
        state.sys.refresh_memory();
        state
            .sys
            .refresh_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));
        state.refresh_disks();
        state.networks.refresh();

        let mounted = state.mounted_volumes();
        let mut sampled = Vec::with_capacity(volumes.len());
        for volume in volumes {
            match containing_volume(volume, &mounted) {
                Some(usage) => sampled.push(VolumeUsage::new(
                    volume.clone(),
                    usage.total_bytes,
                    usage.free_bytes,
                )),
                None => debug!(volume = %volume.display(), "Monitored volume not mounted"),
            }
        }
        if !volumes.is_empty() && sampled.is_empty() {
            return Err(SampleError::UnknownVolume(volumes[0].clone()));
        }

        let (net_sent_bytes, net_recv_bytes) = state
            .networks
            .list()
            .values()
            .fold((0u64, 0u64), |(sent, recv), data| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            });

        let total_memory = state.sys.total_memory();
        let available_memory = state.sys.available_memory();

        Ok(Metric {
            timestamp: self.clock.now(),
            cpu_percent: round_to(state.sys.global_cpu_usage() as f64, 1) as f32,
            cpu_per_core: state
                .sys
                .cpus()
                .iter()
                .map(|cpu| round_to(cpu.cpu_usage() as f64, 1) as f32)
                .collect(),
            memory_percent: state.memory_percent(),
            memory_used_bytes: total_memory.saturating_sub(available_memory),
            memory_available_bytes: available_memory,
            volumes: sampled,
            net_sent_bytes,
            net_recv_bytes,
            process_count: state.sys.processes().len(),
        })
    }

    fn static_info(&self) -> StaticInfo {
        self.static_info.clone()
    }

    fn volume_usage(&self, path: &Path) -> Result<VolumeUsage, SampleError> {
        let mut state = self.lock();
        state.refresh_disks();
        let mounted = state.mounted_volumes();

        containing_volume(path, &mounted)
            .map(|usage| VolumeUsage::new(path.to_path_buf(), usage.total_bytes, usage.free_bytes))
            .ok_or_else(|| SampleError::UnknownVolume(path.to_path_buf()))
    }

    fn memory_percent(&self) -> Result<f32, SampleError> {
        let mut state = self.lock();
        state.sys.refresh_memory();
        Ok(state.memory_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    #[test]
    fn test_metric_timestamp_comes_from_clock() {
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let probe = SysinfoProbe::with_clock(Arc::new(ManualClock::at(at)));

        let metric = probe.sample(&[]).unwrap();
        assert_eq!(metric.timestamp, at);
        assert!(metric.volumes.is_empty());
        assert_eq!(metric.cpu_per_core.len(), probe.static_info().logical_cores);
    }
}
