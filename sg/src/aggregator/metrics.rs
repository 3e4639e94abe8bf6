//! Aggregator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters shared between request handlers and the dispatcher
#[derive(Debug, Default)]
pub struct Counters {
    pub(crate) requests_total: AtomicU64,
    pub(crate) quorum_met: AtomicU64,
    pub(crate) timed_out: AtomicU64,
    pub(crate) publish_failures: AtomicU64,
    pub(crate) duplicate_keys: AtomicU64,
    pub(crate) replies_received: AtomicU64,
    pub(crate) replies_delivered: AtomicU64,
    pub(crate) replies_unmatched: AtomicU64,
    pub(crate) replies_dropped_full: AtomicU64,
    pub(crate) replies_malformed: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy; `in_flight` comes from the registry
    pub fn snapshot(&self, in_flight: usize) -> AggregatorMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        AggregatorMetrics {
            in_flight,
            requests_total: load(&self.requests_total),
            quorum_met: load(&self.quorum_met),
            timed_out: load(&self.timed_out),
            publish_failures: load(&self.publish_failures),
            duplicate_keys: load(&self.duplicate_keys),
            replies_received: load(&self.replies_received),
            replies_delivered: load(&self.replies_delivered),
            replies_unmatched: load(&self.replies_unmatched),
            replies_dropped_full: load(&self.replies_dropped_full),
            replies_malformed: load(&self.replies_malformed),
        }
    }
}

/// Aggregator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorMetrics {
    pub in_flight: usize,
    pub requests_total: u64,
    pub quorum_met: u64,
    pub timed_out: u64,
    pub publish_failures: u64,
    pub duplicate_keys: u64,
    pub replies_received: u64,
    pub replies_delivered: u64,
    pub replies_unmatched: u64,
    pub replies_dropped_full: u64,
    pub replies_malformed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_bumps() {
        let counters = Counters::default();
        Counters::bump(&counters.requests_total);
        Counters::bump(&counters.requests_total);
        Counters::bump(&counters.replies_unmatched);

        let metrics = counters.snapshot(3);
        assert_eq!(metrics.in_flight, 3);
        assert_eq!(metrics.requests_total, 2);
        assert_eq!(metrics.replies_unmatched, 1);
        assert_eq!(metrics.quorum_met, 0);
    }
}
