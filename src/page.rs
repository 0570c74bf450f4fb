//! Page handles and the traits the pool uses to talk to the system.
//!
//! The pool never touches page contents. It shuffles opaque handles between
//! the system allocator and whichever consumer asked for memory, so the
//! system-facing side is expressed as three small traits:
//!
//! - [`PageAllocator`]: slow-path allocation and release of single pages
//! - [`MemInfo`]: total/free memory queries in page units
//! - [`CacheMaintenance`]: one global clean covering all pooled pages

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Number of pages per megabyte.
pub const PAGES_PER_MB: u32 = (1024 * 1024 / PAGE_SIZE) as u32;

/// Opaque identifier for one unit of physical memory.
///
/// Minted by a [`PageAllocator`]; the pool only stores and moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(u64);

impl PageHandle {
    /// Wrap a raw handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A page together with its state bits.
///
/// State flags live in explicit fields rather than in the low bits of the
/// handle value, so the handle stays opaque and alignment-agnostic.
///
/// `PooledPage` is deliberately neither `Copy` nor `Clone`: exactly one
/// owner holds a page at any time, either a ring slot or the consumer it
/// was handed to.
#[derive(Debug, PartialEq, Eq)]
pub struct PooledPage {
    handle: PageHandle,
    dirty: bool,
    reserved: bool,
}

impl PooledPage {
    /// Create a clean, unreserved page around a handle.
    pub fn new(handle: PageHandle) -> Self {
        Self {
            handle,
            dirty: false,
            reserved: false,
        }
    }

    /// The underlying handle.
    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    /// Whether this page may hold stale cache lines.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark or clear the per-page dirty bit.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Whether this page is reserved by a consumer.
    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Mark or clear the reserved bit.
    pub fn set_reserved(&mut self, reserved: bool) {
        self.reserved = reserved;
    }
}

/// Flags passed to the system allocator on the slow path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocFlags {
    /// Fail instead of triggering reclaim in the system allocator.
    pub avoid_reclaim: bool,
    /// Deliver a zeroed page.
    pub zero: bool,
}

/// Slow-path page allocation, provided by the surrounding system.
///
/// Implementations must be callable from multiple threads; the pool calls
/// this from consumers and from the background refill thread, never while
/// holding the pool lock.
pub trait PageAllocator: Send + Sync {
    /// Allocate one fresh page. Returns `None` when the system is out of
    /// memory.
    fn alloc_page(&self, flags: AllocFlags) -> Option<PooledPage>;

    /// Return a page to the system.
    fn free_page(&self, page: PooledPage);
}

/// System memory information, in page units.
pub trait MemInfo: Send + Sync {
    /// Total system memory.
    fn total_pages(&self) -> u32;

    /// Currently free system memory.
    fn free_pages(&self) -> u32;
}

/// Cache maintenance over all currently pooled pages.
pub trait CacheMaintenance: Send + Sync {
    /// Clean/flush all cache levels for pooled memory.
    ///
    /// This is one global operation, not per-page; it must cover every page
    /// resident in the pool at the time of the call. Calling it more often
    /// than strictly needed is harmless.
    fn clean_all(&self);
}
