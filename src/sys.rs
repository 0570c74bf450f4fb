//! In-process implementation of the system-facing traits.
//!
//! [`SystemMemory`] models a machine with a fixed number of pages: handles
//! are minted from a counter, free memory shrinks as pages are allocated,
//! and cache cleans are counted. It backs the test suite and serves as the
//! reference for wiring a real allocator behind the traits.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::page::{AllocFlags, CacheMaintenance, MemInfo, PageAllocator, PageHandle, PooledPage};

/// A simulated system memory of fixed size.
#[derive(Debug)]
pub struct SystemMemory {
    total_pages: u32,
    allocated: AtomicU32,
    next_handle: AtomicU64,
    freed: AtomicU64,
    cache_cleans: AtomicU64,
}

impl SystemMemory {
    /// Create a system with `total_pages` of memory, all free.
    pub fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            allocated: AtomicU32::new(0),
            next_handle: AtomicU64::new(1),
            freed: AtomicU64::new(0),
            cache_cleans: AtomicU64::new(0),
        }
    }

    /// Pages currently allocated out of this system.
    pub fn live_pages(&self) -> u32 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Total pages ever freed back.
    pub fn freed(&self) -> u64 {
        self.freed.load(Ordering::Relaxed)
    }

    /// Number of global cache cleans performed.
    pub fn cache_cleans(&self) -> u64 {
        self.cache_cleans.load(Ordering::Relaxed)
    }
}

impl PageAllocator for SystemMemory {
    fn alloc_page(&self, flags: AllocFlags) -> Option<PooledPage> {
        // Claim a page or report out-of-memory, without over-committing
        // under concurrent allocation.
        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            if current >= self.total_pages {
                return None;
            }
            match self.allocated.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }

        let handle = PageHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let mut page = PooledPage::new(handle);
        // A fresh non-zeroed page may carry stale data.
        page.set_dirty(!flags.zero);
        Some(page)
    }

    fn free_page(&self, _page: PooledPage) {
        self.allocated.fetch_sub(1, Ordering::Relaxed);
        self.freed.fetch_add(1, Ordering::Relaxed);
    }
}

impl MemInfo for SystemMemory {
    fn total_pages(&self) -> u32 {
        self.total_pages
    }

    fn free_pages(&self) -> u32 {
        self.total_pages
            .saturating_sub(self.allocated.load(Ordering::Relaxed))
    }
}

impl CacheMaintenance for SystemMemory {
    fn clean_all(&self) {
        self.cache_cleans.fetch_add(1, Ordering::Relaxed);
    }
}
