//! End-to-end tests of the background refill path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use page_pool::{AllocFlags, MemInfo, PageAllocator, PagePool, PoolConfig, SystemMemory};

/// Poll until `cond` holds, failing the test after five seconds.
fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn build_pool(system: &Arc<SystemMemory>, config: PoolConfig) -> PagePool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    PagePool::builder(system.clone(), system.clone(), system.clone())
        .config(config)
        .build()
        .unwrap()
}

#[test]
fn miss_triggers_background_refill() {
    let system = Arc::new(SystemMemory::new(1 << 18));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(512),
            fill_threshold: 16,
            reserved_floor_mb: 1,
            ..Default::default()
        },
    );

    // Cold pool: the first request misses and schedules a refill.
    assert!(pool.alloc_one().is_none());

    wait_until("pool to refill after a miss", || pool.available() > 0);

    let page = pool.alloc_one().expect("refilled pool should hit");
    assert_eq!(pool.stats().counters.hits, 1);
    system.free_page(page);
}

#[test]
fn refill_stops_at_reserved_floor() {
    // 1000-page system with a 768-page floor: only 232 pages of headroom,
    // so the worker must stop there even though the ring could hold 600.
    let system = Arc::new(SystemMemory::new(1000));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(600),
            fill_threshold: 1,
            reserved_floor_mb: 3, // 768 pages
            ..Default::default()
        },
    );

    assert!(pool.alloc_one().is_none());

    wait_until("refill up to the headroom limit", || {
        pool.available() == 232
    });
    std::thread::sleep(Duration::from_millis(50));

    // The worker stopped exactly at the floor and stayed there.
    assert_eq!(pool.available(), 232);
    assert_eq!(system.free_pages(), 768);
}

#[test]
fn refill_target_never_exceeds_length() {
    let system = Arc::new(SystemMemory::new(1 << 18));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(300),
            fill_threshold: 1,
            reserved_floor_mb: 1,
            ..Default::default()
        },
    );

    // A burst of misses posts several targets; they coalesce rather than
    // stack, so the pool never fills past its length.
    for _ in 0..10 {
        let _ = pool.alloc_one();
    }

    wait_until("pool to fill to length", || pool.available() == 300);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(pool.available(), 300);
}

#[test]
fn zero_fill_pool_delivers_clean_pages() {
    let system = Arc::new(SystemMemory::new(1 << 18));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(64),
            zero_fill: true,
            fill_threshold: 1,
            reserved_floor_mb: 1,
            ..Default::default()
        },
    );

    assert!(pool.alloc_one().is_none());
    wait_until("zero-fill refill", || pool.available() > 0);

    let page = pool.alloc_one().unwrap();
    assert!(!page.is_dirty(), "zero-fill pages must arrive clean");
    system.free_page(page);
}

#[test]
fn disabled_pool_never_refills() {
    let system = Arc::new(SystemMemory::new(1 << 18));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(64),
            enabled: false,
            fill_threshold: 1,
            reserved_floor_mb: 1,
            ..Default::default()
        },
    );

    assert!(pool.alloc_one().is_none());
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(pool.available(), 0);
    assert_eq!(system.live_pages(), 0);
}

#[test]
fn refill_survives_system_oom() {
    // Tiny system: the worker's batch allocation fails, the pass aborts,
    // and nothing leaks.
    let system = Arc::new(SystemMemory::new(64));
    let pool = build_pool(
        &system,
        PoolConfig {
            length: Some(32),
            fill_threshold: 1,
            reserved_floor_mb: 0,
            ..Default::default()
        },
    );

    // Consume most of the system directly so refill has little headroom.
    let mut hoard: Vec<_> = (0..60)
        .map(|_| system.alloc_page(AllocFlags::default()).unwrap())
        .collect();

    assert!(pool.alloc_one().is_none());

    // Race the worker for the remaining pages. If it loses, its batch
    // allocation fails mid-way and unwinds.
    while let Some(page) = system.alloc_page(AllocFlags::default()) {
        hoard.push(page);
    }
    std::thread::sleep(Duration::from_millis(100));

    // Whichever side won, no page is unaccounted for.
    assert_eq!(
        system.live_pages() as usize,
        hoard.len() + pool.available() as usize
    );

    for page in hoard {
        system.free_page(page);
    }
}

#[test]
fn drop_joins_worker_and_returns_pages() {
    let system = Arc::new(SystemMemory::new(1 << 18));
    {
        let pool = build_pool(
            &system,
            PoolConfig {
                length: Some(256),
                fill_threshold: 1,
                reserved_floor_mb: 1,
                ..Default::default()
            },
        );
        assert!(pool.alloc_one().is_none());
        wait_until("some refill before teardown", || pool.available() > 0);
        // Drop with the worker recently active.
    }
    assert_eq!(system.live_pages(), 0);
}
