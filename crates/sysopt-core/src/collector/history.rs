//! Fixed-capacity rolling windows used for trend display

use crate::models::{HistorySnapshot, Metric, NetworkPoint};
use std::collections::VecDeque;

/// Default number of points per window
pub const DEFAULT_HISTORY_POINTS: usize = 60;

/// Ring buffer that evicts its oldest entry once full
#[derive(Debug, Clone)]
pub struct RingHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-first copy of the window
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// The four per-resource windows owned by the collector
#[derive(Debug, Clone)]
pub struct ResourceHistory {
    cpu: RingHistory<f32>,
    memory: RingHistory<f32>,
    disk: RingHistory<f32>,
    network: RingHistory<NetworkPoint>,
}

impl ResourceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu: RingHistory::new(capacity),
            memory: RingHistory::new(capacity),
            disk: RingHistory::new(capacity),
            network: RingHistory::new(capacity),
        }
    }

    pub fn record(&mut self, metric: &Metric) {
        self.cpu.push(metric.cpu_percent);
        self.memory.push(metric.memory_percent);
        self.disk.push(metric.primary_disk_percent());
        self.network.push(NetworkPoint {
            sent_bytes: metric.net_sent_bytes,
            recv_bytes: metric.net_recv_bytes,
        });
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            cpu: self.cpu.to_vec(),
            memory: self.memory.to_vec(),
            disk: self.disk.to_vec(),
            network: self.network.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }
}

impl Default for ResourceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_POINTS)
    }
}
