//! Pipeline counters.
//!
//! Updated from both contexts with relaxed atomics; a snapshot is only
//! approximately consistent across fields.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Bytes read from the source by the receive context.
    received: AtomicU64,
    /// Bytes accepted by the sink.
    delivered: AtomicU64,
    /// Bytes discarded under [`OverflowPolicy::DropNewest`](crate::OverflowPolicy).
    dropped: AtomicU64,
    /// Notifications that actually raised the wake signal.
    wakeups: AtomicU64,
    /// Completed drain-to-empty passes.
    drain_passes: AtomicU64,
}

impl PipelineStats {
    pub const fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            drain_passes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self, count: usize) {
        if count > 0 {
            self.delivered.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_drain_pass(&self) {
        self.drain_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            drain_passes: self.drain_passes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub wakeups: u64,
    pub drain_passes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let stats = PipelineStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_delivered(2);
        stats.record_delivered(0);
        stats.record_wakeup();
        stats.record_drain_pass();

        let snap = stats.snapshot();
        assert_eq!(snap.received, 2);
        assert_eq!(snap.delivered, 2);
        assert_eq!(snap.dropped, 0);
        assert_eq!(snap.wakeups, 1);
        assert_eq!(snap.drain_passes, 1);
    }
}
