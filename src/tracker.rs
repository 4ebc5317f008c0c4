//! Latest-state tracker: the last accepted reading of every node.
//!
//! Updates follow last-write-wins guarded by timestamp monotonicity: a
//! reading older than the one already held for its node is discarded
//! (and counted), never reported as an error. The tracker is an owned
//! object handed to the router; there is no process-global state.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock,
    },
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Reading, StatusItem};

// ---

/// Source of "now" used to stamp readings that arrive without a timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What an upsert did to the node's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Strictly older than the stored reading; dropped.
    Stale,
}

impl UpsertOutcome {
    pub fn accepted(self) -> bool {
        self != UpsertOutcome::Stale
    }
}

/// Counters exposed for diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub nodes: usize,
    pub accepted: u64,
    pub stale_discarded: u64,
}

pub struct LatestStateTracker {
    // ---
    latest: RwLock<HashMap<String, Reading>>,
    clock: Box<dyn Clock>,
    accepted: AtomicU64,
    stale_discarded: AtomicU64,
}

impl Default for LatestStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestStateTracker {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        // ---
        LatestStateTracker {
            latest: RwLock::new(HashMap::new()),
            clock: Box::new(clock),
            accepted: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
        }
    }

    /// Current time according to the tracker's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store `reading` unless a strictly newer one is already held for
    /// its node. Equal timestamps replace (last write wins).
    pub fn upsert(&self, reading: Reading) -> UpsertOutcome {
        // ---
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);

        let outcome = match latest.get(&reading.node_id) {
            None => UpsertOutcome::Inserted,
            Some(current) if reading.timestamp >= current.timestamp => UpsertOutcome::Replaced,
            Some(current) => {
                tracing::debug!(
                    "Discarding stale reading for {}: {} < {}",
                    reading.node_id,
                    reading.timestamp,
                    current.timestamp
                );
                self.stale_discarded.fetch_add(1, Ordering::Relaxed);
                return UpsertOutcome::Stale;
            }
        };

        latest.insert(reading.node_id.clone(), reading);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Per-node status sorted ascending by `node_id`.
    pub fn snapshot(&self) -> Vec<StatusItem> {
        // ---
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<StatusItem> = latest.values().map(Reading::to_status).collect();
        drop(latest);

        items.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        items
    }

    pub fn stats(&self) -> TrackerStats {
        // ---
        let nodes = self
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        TrackerStats {
            nodes,
            accepted: self.accepted.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn create_test_reading(node: &str, minutes: i64, latency: f64) -> Reading {
        // ---
        Reading {
            node_id: node.to_string(),
            timestamp: t(minutes),
            latency_ms: latency,
            jitter_ms: 3.0,
            rssi_dbm: -65.0,
            noise_dbm: -90.0,
            failure: Some(false),
        }
    }

    #[test]
    fn test_first_reading_inserted() {
        // ---
        let tracker = LatestStateTracker::new();
        assert_eq!(
            tracker.upsert(create_test_reading("node-01", 0, 20.0)),
            UpsertOutcome::Inserted
        );
        assert_eq!(tracker.snapshot().len(), 1);
    }

    #[test]
    fn test_stale_reading_discarded() {
        // ---
        let tracker = LatestStateTracker::new();
        tracker.upsert(create_test_reading("node-01", 10, 11.0));

        let outcome = tracker.upsert(create_test_reading("node-01", 5, 55.0));
        assert_eq!(outcome, UpsertOutcome::Stale);
        assert!(!outcome.accepted());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot[0].timestamp, t(10));
        assert_eq!(snapshot[0].latency_ms, 11.0);

        let stats = tracker.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.stale_discarded, 1);
    }

    #[test]
    fn test_equal_timestamp_replaces() {
        // ---
        let tracker = LatestStateTracker::new();
        tracker.upsert(create_test_reading("node-01", 10, 11.0));

        assert_eq!(
            tracker.upsert(create_test_reading("node-01", 10, 12.0)),
            UpsertOutcome::Replaced
        );
        assert_eq!(tracker.snapshot()[0].latency_ms, 12.0);
    }

    #[test]
    fn test_final_state_is_max_timestamp_for_any_order() {
        // ---
        let orders = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];

        for order in orders {
            let tracker = LatestStateTracker::new();
            for minutes in order {
                tracker.upsert(create_test_reading("node-01", minutes, minutes as f64));
            }
            let snapshot = tracker.snapshot();
            assert_eq!(snapshot[0].timestamp, t(3), "order {order:?}");
            assert_eq!(snapshot[0].latency_ms, 3.0, "order {order:?}");
        }
    }

    #[test]
    fn test_snapshot_sorted_by_node_id() {
        // ---
        let tracker = LatestStateTracker::new();
        for node in ["node-03", "node-10", "node-01", "alpha", "node-02"] {
            tracker.upsert(create_test_reading(node, 0, 20.0));
        }

        let ids: Vec<_> = tracker.snapshot().into_iter().map(|s| s.node_id).collect();
        assert_eq!(ids, vec!["alpha", "node-01", "node-02", "node-03", "node-10"]);
        assert_eq!(tracker.stats().nodes, 5);
    }

    #[test]
    fn test_clock_is_injectable() {
        // ---
        let tracker = LatestStateTracker::with_clock(FixedClock(t(42)));
        assert_eq!(tracker.now(), t(42));
    }

    #[test]
    fn test_concurrent_upserts() {
        // ---
        let tracker = std::sync::Arc::new(LatestStateTracker::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for minutes in 0..50 {
                        tracker.upsert(create_test_reading(&format!("node-{n:02}"), minutes, 1.0));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.iter().all(|s| s.timestamp == t(49)));
        assert_eq!(tracker.stats().accepted, 200);
    }
}
