//! Bounded hand-off queue between the sampling task and consumers
//!
//! Freshness over completeness: when full, the oldest unread metric is
//! evicted so the producer never blocks and the newest reading is kept.

use crate::models::Metric;
use std::collections::VecDeque;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct MetricQueue {
    buffer: VecDeque<Metric>,
    capacity: usize,
}

impl MetricQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Enqueue a metric, returning the evicted oldest entry on overflow
    pub fn push(&mut self, metric: Metric) -> Option<Metric> {
        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(metric);
        evicted
    }

    /// Dequeue the oldest metric, if any
    pub fn pop(&mut self) -> Option<Metric> {
        self.buffer.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MetricQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::metric;

    #[test]
    fn test_queue_fifo_order() {
        let mut queue = MetricQueue::new(10);
        queue.push(metric(1));
        queue.push(metric(2));

        assert_eq!(queue.pop().unwrap().process_count, 1);
        assert_eq!(queue.pop().unwrap().process_count, 2);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_queue_overflow_drops_oldest() {
        let mut queue = MetricQueue::default();

        for n in 1..=100 {
            assert!(queue.push(metric(n)).is_none());
        }
        let evicted = queue.push(metric(101)).unwrap();

        assert_eq!(evicted.process_count, 1);
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.pop().unwrap().process_count, 2);
    }

    #[test]
    fn test_queue_zero_capacity_keeps_latest() {
        let mut queue = MetricQueue::new(0);
        queue.push(metric(1));
        queue.push(metric(2));

        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().process_count, 2);
    }
}
