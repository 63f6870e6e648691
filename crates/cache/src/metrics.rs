//! Request counters for tile grids
//!
//! Grids report what happens on each request to a [`GridMetrics`] sink
//! supplied at construction. Nothing is process-global: two grids only share
//! counters if they are handed the same sink.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives grid request events
///
/// All methods default to doing nothing, so implementors only override what
/// they care about.
pub trait GridMetrics: Send + Sync {
    /// An in-bounds `get_tile` call
    fn record_request(&self) {}

    /// A request served from a resident payload
    fn record_hit(&self) {}

    /// A request that had to run the generator
    fn record_miss(&self) {}

    /// A generator invocation that failed
    fn record_generation_failure(&self) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl GridMetrics for NoopMetrics {}

/// Snapshot of grid request counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    /// In-bounds requests
    pub requests: u64,

    /// Requests served without generating
    pub hits: u64,

    /// Requests that ran the generator
    pub misses: u64,

    /// Generator failures
    pub generation_failures: u64,
}

impl GridStats {
    /// Calculate the hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters
#[derive(Debug, Default)]
pub struct AtomicGridMetrics {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    generation_failures: AtomicU64,
}

impl AtomicGridMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values
    pub fn snapshot(&self) -> GridStats {
        GridStats {
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.generation_failures.store(0, Ordering::Relaxed);
    }
}

impl GridMetrics for AtomicGridMetrics {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }
}
