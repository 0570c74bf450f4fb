//! Pool debug counters.
//!
//! Counters are plain relaxed atomics updated on every operation and read
//! through [`PoolCounters::snapshot`]. They exist for observability only
//! and carry no synchronization meaning.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking pool traffic.
#[derive(Debug, Default)]
pub struct PoolCounters {
    /// Pages handed out of the pool.
    pub allocs: AtomicU64,
    /// Pages accepted into the pool.
    pub fills: AtomicU64,
    /// Alloc requests satisfied from the pool.
    pub hits: AtomicU64,
    /// Alloc requests the pool could not satisfy.
    pub misses: AtomicU64,
}

impl PoolCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_alloc(&self, nr: u64) {
        self.allocs.fetch_add(nr, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_fill(&self, nr: u64) {
        self.fills.fetch_add(nr, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_hit(&self, nr: u64) {
        self.hits.fetch_add(nr, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self, nr: u64) {
        self.misses.fetch_add(nr, Ordering::Relaxed);
    }

    /// Snapshot the current counter values.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            allocs: self.allocs.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`PoolCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Pages handed out of the pool.
    pub allocs: u64,
    /// Pages accepted into the pool.
    pub fills: u64,
    /// Alloc requests satisfied from the pool.
    pub hits: u64,
    /// Alloc requests the pool could not satisfy.
    pub misses: u64,
}

impl CounterSnapshot {
    /// Hit rate as a percentage (0.0 - 100.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Pool occupancy and counters, exported together.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    /// Configured ring length in pages.
    pub length: u32,
    /// Pages currently resident in the ring.
    pub available: u32,
    /// Traffic counters.
    pub counters: CounterSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = PoolCounters::new();
        counters.record_fill(3);
        counters.record_alloc(2);
        counters.record_hit(2);
        counters.record_miss(1);
        counters.record_fill(1);

        let snap = counters.snapshot();
        assert_eq!(snap.fills, 4);
        assert_eq!(snap.allocs, 2);
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
    }

    #[test]
    fn test_hit_rate() {
        let snap = CounterSnapshot {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((snap.hit_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate_no_traffic() {
        assert_eq!(CounterSnapshot::default().hit_rate(), 0.0);
    }
}
