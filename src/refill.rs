//! Background refill worker.
//!
//! One long-lived thread per pool. It parks on a condvar until the wakeup
//! policy posts a fill target, then runs a fill pass:
//!
//! 1. Swap-read the pending target; bail if zero or pooling is disabled.
//! 2. Check free memory against the reserved floor; abort the pass if the
//!    system is too low. The dropped remainder is not retried; the next
//!    consumer miss recomputes a fresh target.
//! 3. Allocate a bounded batch into a staging buffer, outside any lock.
//! 4. Bulk-fill the ring under one short lock hold; free staged pages that
//!    did not fit.
//! 5. Repeat until the target is exhausted, the ring is full, allocation
//!    fails, or a stop is requested.
//!
//! After a pass that filled anything, the deferred cache clean runs here in
//! the background so the next consumer alloc does not pay for it.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use crate::page::{AllocFlags, PageAllocator, PooledPage};
use crate::pool::PoolShared;

/// Staging buffer size in pages: 1 MiB worth of 4 KiB pages. Caps how much
/// a single batch allocates before touching the pool lock.
pub(crate) const STAGING_PAGES: u32 = 256;

/// Worker thread entry point. Runs until a stop is requested.
pub(crate) fn run(shared: Arc<PoolShared>) {
    info!("page pool refill thread starting");

    loop {
        {
            let mut guard = shared.wake_lock.lock();
            while !shared.stop.load(Ordering::Acquire)
                && shared.pending_fill.load(Ordering::Acquire) == 0
            {
                shared.wake.wait(&mut guard);
            }
        }

        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        fill_pass(&shared);
    }

    debug!("page pool refill thread stopping");
}

/// One complete fill pass against the current pending target.
fn fill_pass(shared: &PoolShared) {
    // Redundant wakeups coalesce here: whatever target was posted last is
    // consumed whole and the counter resets to zero.
    let mut target = shared.pending_fill.swap(0, Ordering::AcqRel);
    if target == 0 || !shared.enabled.load(Ordering::Relaxed) {
        return;
    }

    let flags = AllocFlags {
        avoid_reclaim: true,
        zero: shared.zero_fill.load(Ordering::Relaxed),
    };

    let mut staged: Vec<PooledPage> = Vec::with_capacity(STAGING_PAGES as usize);
    let mut filled_any = false;

    while target > 0 {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let free = shared.meminfo.free_pages();
        if free <= shared.policy.reserved_floor_pages() {
            debug!(free, "refill pass aborted, system memory low");
            break;
        }

        let nr = STAGING_PAGES.min(target);
        if !alloc_batch(&*shared.allocator, flags, nr, &mut staged) {
            warn!(pages = target, "failed to allocate pages for pool refill");
            break;
        }

        let filled = {
            let mut ring = shared.ring.lock();
            shared.fill_lots_locked(&mut ring, &mut staged)
        };
        filled_any |= filled > 0;

        // Staged pages that did not fit go straight back to the system.
        for page in staged.drain(..) {
            shared.allocator.free_page(page);
        }

        target -= nr;
        if filled < nr {
            break;
        }
    }

    // Clean in the background so allocs right after a fill don't pay the
    // cache-clean overhead.
    if filled_any {
        shared.clean_cache();
    }
}

/// Allocate `nr` pages into `staged`, one at a time.
///
/// On failure every page allocated in this batch is released again and the
/// batch reports failure; no partial batch leaks.
fn alloc_batch(
    allocator: &dyn PageAllocator,
    flags: AllocFlags,
    nr: u32,
    staged: &mut Vec<PooledPage>,
) -> bool {
    for _ in 0..nr {
        match allocator.alloc_page(flags) {
            Some(page) => staged.push(page),
            None => {
                for page in staged.drain(..) {
                    allocator.free_page(page);
                }
                return false;
            }
        }
    }
    true
}
