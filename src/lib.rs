//! page-pool: a fixed-capacity pool of physical memory pages.
//!
//! Caches pages so the common allocation path never reaches the slow
//! system allocator. Building blocks:
//!
//! - **Index ring**: circular slot array with alloc/fill indices and a
//!   count, all behind the pool's single mutex
//! - **Page pool**: alloc/fill single and bulk, resize, drain, clear
//! - **Background refill**: a parked worker thread that bulk-allocates
//!   from the system and feeds the ring in short lock holds
//! - **Wakeup policy**: decides on every miss whether and how much to
//!   refill, bounded by a reserved free-memory floor
//! - **Shrinker**: low-memory hook draining pages back on demand
//! - **Cache tracker**: one pool-wide dirty flag batching cache cleans
//!   into at most one operation between a fill and the next alloc
//!
//! # Data flow
//!
//! ```text
//!   consumer ---- alloc_one/alloc_bulk ----> [ PagePool | IndexRing ]
//!       ^                                       |  miss        ^
//!       |                                       v              | fill_bulk
//!   pages out                            WakeupPolicy ---> refill thread
//!                                                              |
//!   consumer ---- fill_one/fill_bulk --------------------------+--> system
//!                                                   (PageAllocator)
//! ```
//!
//! The system side is abstracted behind three traits ([`PageAllocator`],
//! [`MemInfo`], [`CacheMaintenance`]); [`SystemMemory`] is an in-process
//! implementation used by the tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod metrics;
mod page;
mod policy;
mod pool;
mod refill;
mod ring;
mod shrink;
mod sys;

pub use config::{
    DEFAULT_FILL_THRESHOLD, DEFAULT_RESERVED_FLOOR_MB, DEFAULT_SIZE_RATIO, DEFAULT_ZERO_FILL_MIN,
    PoolConfig,
};
pub use error::{PoolError, PoolResult};
pub use metrics::{CounterSnapshot, PoolCounters, PoolStats};
pub use page::{
    AllocFlags, CacheMaintenance, MemInfo, PAGE_SIZE, PAGES_PER_MB, PageAllocator, PageHandle,
    PooledPage,
};
pub use policy::WakeupPolicy;
pub use pool::{PagePool, PagePoolBuilder};
pub use shrink::Shrinker;
pub use sys::SystemMemory;
