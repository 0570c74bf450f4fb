//! Refill wakeup heuristic.
//!
//! Decides, on every consumer miss and after every successful single alloc,
//! whether the background worker should be woken and with what fill target.
//! The decision is a pure function of pool occupancy and system free memory
//! so it can be tested in isolation.

use crate::config::PoolConfig;

/// The wakeup decision parameters, fixed at pool construction.
#[derive(Debug, Clone, Copy)]
pub struct WakeupPolicy {
    /// Occupancy below which a non-zero-fill pool requests refill.
    zero_fill_min: u32,
    /// Minimum empty slots for a wakeup to be worthwhile.
    fill_threshold: u32,
    /// Free system memory that refill must leave untouched, in pages.
    reserved_floor_pages: u32,
}

impl WakeupPolicy {
    /// Build a policy from configuration.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            zero_fill_min: config.zero_fill_min,
            fill_threshold: config.fill_threshold,
            reserved_floor_pages: config.reserved_floor_pages(),
        }
    }

    /// The reserved floor in pages.
    pub fn reserved_floor_pages(&self) -> u32 {
        self.reserved_floor_pages
    }

    /// Compute the fill target, or `None` when the worker should stay
    /// parked.
    ///
    /// A wakeup requires all of:
    ///
    /// - pooling enabled
    /// - zero-fill active, or occupancy at or below `zero_fill_min`
    ///   (without zero-fill, frees from the rest of the system refill the
    ///   pool without allocating, so waking early is needless churn)
    /// - at least `fill_threshold` empty slots
    /// - free memory above the reserved floor
    ///
    /// The target is capped at both the reserved-adjusted free memory and
    /// the ring's free space.
    pub fn fill_target(
        &self,
        enabled: bool,
        zero_fill: bool,
        count: u32,
        length: u32,
        free_pages: u32,
    ) -> Option<u32> {
        if !enabled {
            return None;
        }

        if !zero_fill && count > self.zero_fill_min {
            return None;
        }

        let space = length - count;
        if space < self.fill_threshold {
            return None;
        }

        let headroom = free_pages.saturating_sub(self.reserved_floor_pages);
        if headroom == 0 {
            return None;
        }

        Some(headroom.min(space))
    }
}
