//! Lock-free pipeline counters and their serializable snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters shared by the queue front-end and every worker.
#[derive(Debug, Default)]
pub struct PoolCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) faults: AtomicU64,
    pub(crate) timeouts: AtomicU64,
    pub(crate) workers_lost: AtomicU64,
    pub(crate) in_flight: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decr(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the conversion pipeline, served by `/api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers: usize,
    pub busy_workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub accepting: bool,
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    /// Codec errors only; faults and timeouts are counted separately.
    pub failed: u64,
    pub faults: u64,
    pub timeouts: u64,
    pub workers_lost: u64,
    pub in_flight: u64,
    pub started_at: DateTime<Utc>,
}

pub(crate) struct Gauges {
    pub workers: usize,
    pub busy_workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub accepting: bool,
    pub started_at: DateTime<Utc>,
}

impl PoolCounters {
    pub(crate) fn snapshot(&self, gauges: Gauges) -> PoolStats {
        PoolStats {
            workers: gauges.workers,
            busy_workers: gauges.busy_workers,
            queue_depth: gauges.queue_depth,
            queue_capacity: gauges.queue_capacity,
            accepting: gauges.accepting,
            submitted: Self::get(&self.submitted),
            rejected: Self::get(&self.rejected),
            completed: Self::get(&self.completed),
            failed: Self::get(&self.failed),
            faults: Self::get(&self.faults),
            timeouts: Self::get(&self.timeouts),
            workers_lost: Self::get(&self.workers_lost),
            in_flight: Self::get(&self.in_flight),
            started_at: gauges.started_at,
        }
    }
}
