//! Engine counters and their serializable snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of an aggregator's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    /// Items accepted into a pending group.
    pub items_received: u64,
    /// Items ignored because the engine was stopped.
    pub items_dropped: u64,
    pub windows_opened: u64,
    /// Windows whose merged result reached the output queue.
    pub windows_delivered: u64,
    /// Windows abandoned because the cancellation token fired.
    pub windows_cancelled: u64,
    /// Windows that ended on a fatal engine error.
    pub windows_failed: u64,
    /// Windows currently delaying or delivering.
    pub open_windows: u64,
}

/// Lock-free counters shared between the engine and its debounce tasks.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    items_received: AtomicU64,
    items_dropped: AtomicU64,
    windows_opened: AtomicU64,
    windows_delivered: AtomicU64,
    windows_cancelled: AtomicU64,
    windows_failed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn item_received(&self) {
        self.items_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_opened(&self) {
        self.windows_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_delivered(&self) {
        self.windows_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_cancelled(&self) {
        self.windows_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_failed(&self) {
        self.windows_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cancelled_windows(&self) -> u64 {
        self.windows_cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> AggregatorStats {
        let windows_opened = self.windows_opened.load(Ordering::Relaxed);
        let windows_delivered = self.windows_delivered.load(Ordering::Relaxed);
        let windows_cancelled = self.windows_cancelled.load(Ordering::Relaxed);
        let windows_failed = self.windows_failed.load(Ordering::Relaxed);
        AggregatorStats {
            items_received: self.items_received.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            windows_opened,
            windows_delivered,
            windows_cancelled,
            windows_failed,
            open_windows: windows_opened
                .saturating_sub(windows_delivered + windows_cancelled + windows_failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_open_windows() {
        let counters = StatsCounters::default();
        counters.window_opened();
        counters.window_opened();
        counters.window_opened();
        counters.window_delivered();
        counters.window_cancelled();
        counters.window_opened();
        counters.window_failed();
        counters.item_received();
        counters.item_dropped();

        let stats = counters.snapshot();
        assert_eq!(stats.windows_opened, 4);
        assert_eq!(stats.windows_failed, 1);
        assert_eq!(stats.open_windows, 1);
        assert_eq!(stats.items_received, 1);
        assert_eq!(stats.items_dropped, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = StatsCounters::default().snapshot();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["windows_delivered"], 0);
        assert_eq!(json["open_windows"], 0);
    }
}
