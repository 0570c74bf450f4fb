//! Memory-pressure shrinker hook.
//!
//! The surrounding system registers a pool with its memory-pressure
//! machinery through the [`Shrinker`] trait. Under pressure it asks the
//! pool to give pages back; with a zero scan count the call is a pure
//! "how much could you give back" query.

use tracing::debug;

use crate::pool::PagePool;

/// Low-memory callback surface.
pub trait Shrinker: Send + Sync {
    /// Release up to `nr_to_scan` pages back to the system and return how
    /// many pages remain resident afterwards.
    ///
    /// `nr_to_scan == 0` performs no draining and just reports occupancy.
    fn shrink(&self, nr_to_scan: u32) -> u32;
}

impl Shrinker for PagePool {
    fn shrink(&self, nr_to_scan: u32) -> u32 {
        if nr_to_scan > 0 {
            debug!(nr_to_scan, "page pool shrinker invoked");
            // Pages leave pool ownership entirely, so the deferred cache
            // clean is bypassed.
            self.drain(nr_to_scan);
        }
        self.available()
    }
}
