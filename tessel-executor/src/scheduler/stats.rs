//! Execution counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the executor.
#[derive(Debug, Default)]
pub(super) struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize) -> ExecutorStats {
        ExecutorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Statistics for executor monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Nodes accepted into the queue.
    pub submitted: u64,
    /// Nodes that ran successfully.
    pub completed: u64,
    /// Nodes that ran and failed.
    pub failed: u64,
    /// Nodes dropped without running: rejected by `add` or drained after a failure.
    pub discarded: u64,
    /// Nodes queued or running right now.
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = Counters::default();
        counters.record_submitted();
        counters.record_submitted();
        counters.record_completed();
        counters.record_failed();
        counters.record_discarded(3);

        let stats = counters.snapshot(1);
        assert_eq!(
            stats,
            ExecutorStats {
                submitted: 2,
                completed: 1,
                failed: 1,
                discarded: 3,
                pending: 1,
            }
        );
    }

    #[test]
    fn stats_serialize() {
        let json = serde_json::to_value(ExecutorStats::default()).unwrap();
        assert_eq!(json["submitted"], 0);
        assert_eq!(json["pending"], 0);
    }
}
