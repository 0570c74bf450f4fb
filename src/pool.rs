//! The page pool.
//!
//! [`PagePool`] caches pages handed back by consumers so that the common
//! allocation path never reaches the slow system allocator. All ring state
//! sits behind one mutex; the lock is never held across system allocation.
//! A dedicated background thread performs bulk refill (see [`crate::refill`])
//! and is woken by the [`WakeupPolicy`] on consumer misses.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use page_pool::{PagePool, PoolConfig, SystemMemory};
//!
//! let system = Arc::new(SystemMemory::new(1 << 18)); // 1 GB of 4K pages
//! let pool = PagePool::builder(system.clone(), system.clone(), system)
//!     .config(PoolConfig {
//!         length: Some(1024),
//!         ..Default::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(pool.length(), 1024);
//! assert!(pool.alloc_one().is_none()); // empty pool misses
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::metrics::{PoolCounters, PoolStats};
use crate::page::{AllocFlags, CacheMaintenance, MemInfo, PageAllocator, PooledPage};
use crate::policy::WakeupPolicy;
use crate::refill;
use crate::ring::IndexRing;

/// State shared between the pool handle and the refill thread.
pub(crate) struct PoolShared {
    /// The index ring. Guards all index/count bookkeeping.
    pub(crate) ring: Mutex<IndexRing>,

    /// Deferred cache-clean flag. Set on any fill, consumed lazily by the
    /// next alloc. Lock-free: a double clean is harmless, a skipped clean
    /// is not possible (see [`PoolShared::clean_cache`]).
    pub(crate) dirty: AtomicBool,

    /// Pending refill target for the worker. Overwritten, never
    /// accumulated: redundant wakeups coalesce into the latest request.
    pub(crate) pending_fill: AtomicU32,

    /// Whether pooling is enabled.
    pub(crate) enabled: AtomicBool,

    /// Whether pages must be delivered pre-zeroed.
    pub(crate) zero_fill: AtomicBool,

    /// Tells the refill thread to exit at its next checkpoint.
    pub(crate) stop: AtomicBool,

    /// Condvar pair parking the refill thread.
    pub(crate) wake_lock: Mutex<()>,
    pub(crate) wake: Condvar,

    pub(crate) policy: WakeupPolicy,
    pub(crate) counters: PoolCounters,

    pub(crate) allocator: Arc<dyn PageAllocator>,
    pub(crate) meminfo: Arc<dyn MemInfo>,
    pub(crate) cache: Arc<dyn CacheMaintenance>,
}

impl PoolShared {
    /// Apply the deferred cache clean if one is pending.
    ///
    /// The flag is cleared before the clean runs; a fill racing in between
    /// re-sets it and the next alloc cleans again. The race direction is
    /// always toward an extra clean, never a missed one.
    pub(crate) fn clean_cache(&self) {
        if self.dirty.swap(false, Ordering::AcqRel) {
            self.cache.clean_all();
        }
    }

    /// Store a refill target and wake the worker.
    pub(crate) fn request_fill(&self, target: u32) {
        self.pending_fill.store(target, Ordering::Release);
        let _guard = self.wake_lock.lock();
        self.wake.notify_one();
    }

    /// Run the wakeup policy against current occupancy and signal the
    /// worker if a refill is warranted. Called with the ring lock held.
    pub(crate) fn evaluate_wakeup(&self, ring: &IndexRing) {
        let target = self.policy.fill_target(
            self.enabled.load(Ordering::Relaxed),
            self.zero_fill.load(Ordering::Relaxed),
            ring.count(),
            ring.length(),
            self.meminfo.free_pages(),
        );
        if let Some(target) = target {
            self.request_fill(target);
        }
    }

    /// Remove one page, with miss accounting and wakeup evaluation.
    /// Called with the ring lock held.
    pub(crate) fn alloc_one_locked(&self, ring: &mut IndexRing) -> Option<PooledPage> {
        if ring.is_empty() {
            self.counters.record_miss(1);
            self.evaluate_wakeup(ring);
            return None;
        }

        self.clean_cache();

        let page = ring.take()?;
        self.counters.record_alloc(1);
        self.counters.record_hit(1);
        self.evaluate_wakeup(ring);
        Some(page)
    }

    /// Move as many pages as fit from the front of `pages` into the ring.
    /// Leftovers stay in `pages`, owned by the caller. Called with the
    /// ring lock held.
    pub(crate) fn fill_lots_locked(&self, ring: &mut IndexRing, pages: &mut Vec<PooledPage>) -> u32 {
        let accept = ring.free_space().min(pages.len() as u32);
        if accept == 0 {
            return 0;
        }

        self.dirty.store(true, Ordering::Release);

        let mut filled = 0u32;
        for page in pages.drain(..accept as usize) {
            match ring.put(page) {
                Ok(()) => filled += 1,
                Err(page) => {
                    debug_assert!(false, "ring rejected a page inside its free space");
                    self.allocator.free_page(page);
                }
            }
        }

        self.counters.record_fill(u64::from(filled));
        filled
    }
}

/// A fixed-capacity pool of pages with background refill.
///
/// Dropping the pool stops and joins the refill thread, then releases every
/// resident page back to the allocator. The join always happens before the
/// ring storage is freed.
pub struct PagePool {
    shared: Arc<PoolShared>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for PagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePool").finish_non_exhaustive()
    }
}

impl PagePool {
    /// Start building a pool around the given system collaborators.
    pub fn builder(
        allocator: Arc<dyn PageAllocator>,
        meminfo: Arc<dyn MemInfo>,
        cache: Arc<dyn CacheMaintenance>,
    ) -> PagePoolBuilder {
        PagePoolBuilder {
            config: PoolConfig::default(),
            allocator,
            meminfo,
            cache,
        }
    }

    /// Take one page out of the pool.
    ///
    /// Returns `None` when the pool is empty or its storage was released;
    /// a miss schedules a background refill before returning. On a hit the
    /// deferred cache clean is applied before the page is handed over.
    pub fn alloc_one(&self) -> Option<PooledPage> {
        let mut ring = self.shared.ring.lock();
        self.shared.alloc_one_locked(&mut ring)
    }

    /// Take up to `nr` pages under a single lock hold.
    ///
    /// Never blocks and never fails: any number of pages from zero up to
    /// `min(nr, available)` is a valid result.
    pub fn alloc_bulk(&self, nr: u32) -> Vec<PooledPage> {
        let mut ring = self.shared.ring.lock();

        self.shared.clean_cache();

        let take = nr.min(ring.count());
        let mut out = Vec::with_capacity(take as usize);
        for _ in 0..take {
            match ring.take() {
                Some(page) => out.push(page),
                None => break,
            }
        }

        let got = out.len() as u64;
        self.shared.counters.record_alloc(got);
        self.shared.counters.record_hit(got);
        self.shared.counters.record_miss(u64::from(nr) - got);
        self.shared.evaluate_wakeup(&ring);
        out
    }

    /// Hand a page back to the pool.
    ///
    /// Returns the page if the pool is full; the caller then owns it and
    /// must release it to the system itself. Any accepted page marks the
    /// pool dirty for the next alloc's cache clean.
    pub fn fill_one(&self, page: PooledPage) -> Result<(), PooledPage> {
        let mut ring = self.shared.ring.lock();
        if ring.is_full() {
            return Err(page);
        }

        self.shared.dirty.store(true, Ordering::Release);
        let result = ring.put(page);
        if result.is_ok() {
            self.shared.counters.record_fill(1);
        }
        result
    }

    /// Hand a batch of pages back to the pool.
    ///
    /// Accepts up to `min(pages.len(), free space)` from the front of the
    /// vector and returns how many were taken. Pages beyond that count stay
    /// in the vector, still owned by the caller.
    pub fn fill_bulk(&self, pages: &mut Vec<PooledPage>) -> u32 {
        let mut ring = self.shared.ring.lock();
        self.shared.fill_lots_locked(&mut ring, pages)
    }

    /// Resize the ring to `new_length` slots.
    ///
    /// Resizing to zero releases the backing storage; the pool then misses
    /// on every alloc until resized again. Otherwise new storage is
    /// reserved first, up to `new_length` resident pages are salvaged into
    /// it and the rest go back to the system. On reservation failure the
    /// pool keeps its previous storage and stays fully usable.
    pub fn resize(&self, new_length: u32) -> PoolResult<()> {
        let mut excess: Vec<PooledPage> = Vec::new();

        {
            let mut ring = self.shared.ring.lock();
            let old_length = ring.length();
            if new_length == old_length {
                return Ok(());
            }

            if new_length == 0 {
                while !ring.is_empty() {
                    match ring.take() {
                        Some(page) => excess.push(page),
                        None => break,
                    }
                }
                *ring = IndexRing::released();
                debug!(from = old_length, "page pool storage released");
            } else {
                let mut next = match IndexRing::new(new_length) {
                    Ok(next) => next,
                    Err(err) => {
                        error!(to = new_length, "page pool resize failed");
                        return Err(err);
                    }
                };

                // Salvage what fits, free the rest.
                while !next.is_full() && !ring.is_empty() {
                    match ring.take() {
                        Some(page) => {
                            if let Err(page) = next.put(page) {
                                excess.push(page);
                                break;
                            }
                        }
                        None => break,
                    }
                }
                while !ring.is_empty() {
                    match ring.take() {
                        Some(page) => excess.push(page),
                        None => break,
                    }
                }

                *ring = next;
                debug!(from = old_length, to = new_length, "page pool resized");
            }
        }

        for page in excess {
            self.shared.allocator.free_page(page);
        }
        Ok(())
    }

    /// Remove up to `max` pages and release them straight to the system.
    ///
    /// Skips the deferred cache clean: the pages are leaving pool ownership
    /// entirely. Returns how many were released.
    pub fn drain(&self, max: u32) -> u32 {
        let mut removed = Vec::new();

        {
            let mut ring = self.shared.ring.lock();
            while (removed.len() as u32) < max && !ring.is_empty() {
                match ring.take() {
                    Some(page) => removed.push(page),
                    None => break,
                }
            }
        }

        let released = removed.len() as u32;
        for page in removed {
            self.shared.allocator.free_page(page);
        }
        released
    }

    /// Drain the entire pool back to the system.
    ///
    /// Fails with [`PoolError::Inconsistent`] if the ring is not observably
    /// empty afterwards, which is unreachable under correct locking.
    pub fn clear_all(&self) -> PoolResult<()> {
        let mut removed = Vec::new();

        {
            let mut ring = self.shared.ring.lock();
            while !ring.is_empty() {
                match ring.take() {
                    Some(page) => removed.push(page),
                    None => break,
                }
            }
            if !ring.is_empty() {
                return Err(PoolError::Inconsistent);
            }
            self.shared.evaluate_wakeup(&ring);
        }

        for page in removed {
            self.shared.allocator.free_page(page);
        }
        Ok(())
    }

    /// Drain up to `nr` pages, timed and logged.
    ///
    /// Returns `(released, remaining)`.
    pub fn shrink_by(&self, nr: u32) -> (u32, u32) {
        let start = Instant::now();
        let released = self.drain(nr);
        let remaining = self.available();
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            released, remaining, "page pool shrink"
        );
        (released, remaining)
    }

    /// Enable or disable pooling.
    ///
    /// Disabling drains every resident page back to the system; the pool
    /// misses on every alloc until re-enabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            let (released, remaining) = self.shrink_by(u32::MAX);
            info!(released, remaining, "page pool disabled and drained");
        }
    }

    /// Whether pooling is enabled.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Whether pages are delivered pre-zeroed.
    pub fn zero_fill(&self) -> bool {
        self.shared.zero_fill.load(Ordering::Relaxed)
    }

    /// Number of pages currently resident.
    pub fn available(&self) -> u32 {
        self.shared.ring.lock().count()
    }

    /// Configured ring length in pages.
    pub fn length(&self) -> u32 {
        self.shared.ring.lock().length()
    }

    /// Occupancy and traffic counters in one consistent snapshot.
    pub fn stats(&self) -> PoolStats {
        let ring = self.shared.ring.lock();
        PoolStats {
            length: ring.length(),
            available: ring.count(),
            counters: self.shared.counters.snapshot(),
        }
    }
}

impl Drop for PagePool {
    fn drop(&mut self) {
        // Stop and join the refill thread before the ring storage can go
        // away underneath it.
        self.shared.stop.store(true, Ordering::Release);
        {
            let _guard = self.shared.wake_lock.lock();
            self.shared.wake.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.drain(u32::MAX);
    }
}

/// Builder for [`PagePool`].
pub struct PagePoolBuilder {
    config: PoolConfig,
    allocator: Arc<dyn PageAllocator>,
    meminfo: Arc<dyn MemInfo>,
    cache: Arc<dyn CacheMaintenance>,
}

impl PagePoolBuilder {
    /// Use the given configuration wholesale.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the pool length in pages.
    pub fn length(mut self, length: u32) -> Self {
        self.config.length = Some(length);
        self
    }

    /// Fill up to `nr` pages at construction (`0` fills the whole pool).
    pub fn prefill(mut self, nr: u32) -> Self {
        self.config.prefill = Some(nr);
        self
    }

    /// Build the pool and start its refill thread.
    ///
    /// Fails if the derived length does not fit in total memory, if ring
    /// storage cannot be reserved, or if the refill thread cannot be
    /// spawned. Failure leaves nothing behind: no thread and no pages.
    pub fn build(self) -> PoolResult<PagePool> {
        let total = self.meminfo.total_pages();
        let length = self.config.target_length(total);
        if length >= total {
            return Err(PoolError::InvalidLength);
        }

        let ring = IndexRing::new(length)?;
        info!(
            pages = length,
            mb = length / crate::page::PAGES_PER_MB,
            "page pool initialized"
        );

        let shared = Arc::new(PoolShared {
            ring: Mutex::new(ring),
            dirty: AtomicBool::new(false),
            pending_fill: AtomicU32::new(0),
            enabled: AtomicBool::new(self.config.enabled),
            zero_fill: AtomicBool::new(self.config.zero_fill),
            stop: AtomicBool::new(false),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
            policy: WakeupPolicy::new(&self.config),
            counters: PoolCounters::new(),
            allocator: self.allocator,
            meminfo: self.meminfo,
            cache: self.cache,
        });

        let worker = std::thread::Builder::new()
            .name("page-pool-refill".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || refill::run(shared)
            })
            .map_err(|_| {
                error!("failed to spawn page pool refill thread");
                PoolError::WorkerSpawn
            })?;

        let pool = PagePool {
            shared,
            worker: Some(worker),
        };

        if let Some(nr) = self.config.prefill {
            pool.run_prefill(nr);
        }

        Ok(pool)
    }
}

impl PagePool {
    /// Construction-time fill: allocate up to `nr` pages (`0` = whole
    /// length) outside the lock, then fill them in one pass. Stops quietly
    /// at the first allocation failure.
    fn run_prefill(&self, nr: u32) {
        let length = self.length();
        let target = if nr == 0 { length } else { nr.min(length) };
        if target == 0 {
            return;
        }

        let flags = AllocFlags {
            avoid_reclaim: false,
            zero: self.zero_fill(),
        };

        let mut staged = Vec::with_capacity(target as usize);
        for _ in 0..target {
            match self.shared.allocator.alloc_page(flags) {
                Some(page) => staged.push(page),
                None => break,
            }
        }

        let filled = self.fill_bulk(&mut staged);
        for page in staged {
            self.shared.allocator.free_page(page);
        }
        info!(filled, length, "page pool prefilled");
    }
}
