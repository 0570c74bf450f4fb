//! Fixed-size circular index ring of pooled pages.
//!
//! The ring is pure bookkeeping: a slot array plus two wrapping indices and
//! a count. It performs no locking of its own; the owning pool serializes
//! every call behind its mutex.
//!
//! Invariants:
//!
//! - `length >= count` at all times
//! - `alloc` and `fill` are in `[0, length)` and advance circularly
//! - empty iff `fill == alloc` and the slot at `alloc` is `None`
//! - full iff `fill == alloc` and the slot at `alloc` is `Some`
//! - a slot is cleared to `None` the moment its page is removed

use crate::error::{PoolError, PoolResult};
use crate::page::PooledPage;

/// Circular buffer of optional page slots.
#[derive(Debug)]
pub(crate) struct IndexRing {
    slots: Vec<Option<PooledPage>>,
    /// Next slot to allocate out of.
    alloc: u32,
    /// Next slot to fill into.
    fill: u32,
    /// Number of occupied slots.
    count: u32,
}

impl IndexRing {
    /// Create a ring with `length` empty slots.
    ///
    /// Storage is reserved up front; a reservation failure is reported as
    /// [`PoolError::OutOfMemory`] without touching any existing state.
    pub(crate) fn new(length: u32) -> PoolResult<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(length as usize)
            .map_err(|_| PoolError::OutOfMemory)?;
        slots.resize_with(length as usize, || None);
        Ok(Self {
            slots,
            alloc: 0,
            fill: 0,
            count: 0,
        })
    }

    /// A ring with no backing storage. Empty and full at once: every alloc
    /// misses and every fill is rejected.
    pub(crate) fn released() -> Self {
        Self {
            slots: Vec::new(),
            alloc: 0,
            fill: 0,
            count: 0,
        }
    }

    /// Number of slots.
    pub(crate) fn length(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of occupied slots.
    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    /// Number of free slots.
    pub(crate) fn free_space(&self) -> u32 {
        self.length() - self.count
    }

    /// Whether the ring holds no pages.
    pub(crate) fn is_empty(&self) -> bool {
        if self.slots.is_empty() {
            return true;
        }
        self.fill == self.alloc && self.slots[self.alloc as usize].is_none()
    }

    /// Whether the ring has no free slot.
    pub(crate) fn is_full(&self) -> bool {
        if self.slots.is_empty() {
            return true;
        }
        self.fill == self.alloc && self.slots[self.alloc as usize].is_some()
    }

    /// Remove and return the oldest page.
    ///
    /// Calling this on an empty ring is a locking bug in the caller; it is
    /// caught by a debug assertion and reported as `None` otherwise.
    pub(crate) fn take(&mut self) -> Option<PooledPage> {
        debug_assert!(!self.is_empty(), "take() on empty ring");
        if self.is_empty() {
            return None;
        }

        let page = self.slots[self.alloc as usize].take();
        debug_assert!(page.is_some(), "occupied ring slot holds no page");
        let page = page?;

        self.alloc = self.advance(self.alloc);
        self.count -= 1;
        Some(page)
    }

    /// Store a page in the next fill slot.
    ///
    /// Returns the page back to the caller if the ring is full; the caller
    /// keeps ownership and must release it to the system itself.
    pub(crate) fn put(&mut self, page: PooledPage) -> Result<(), PooledPage> {
        if self.is_full() {
            return Err(page);
        }

        debug_assert!(self.count < self.length(), "count exceeds ring length");
        debug_assert!(
            self.slots[self.fill as usize].is_none(),
            "fill slot already occupied"
        );

        self.slots[self.fill as usize] = Some(page);
        self.fill = self.advance(self.fill);
        self.count += 1;
        Ok(())
    }

    /// Advance an index by one slot, wrapping at `length`.
    fn advance(&self, ind: u32) -> u32 {
        let next = ind + 1;
        if next >= self.length() { 0 } else { next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageHandle;

    fn page(n: u64) -> PooledPage {
        PooledPage::new(PageHandle::new(n))
    }

    #[test]
    fn test_new_ring_is_empty() {
        let ring = IndexRing::new(4).unwrap();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.length(), 4);
        assert_eq!(ring.count(), 0);
        assert_eq!(ring.free_space(), 4);
    }

    #[test]
    fn test_released_ring_is_empty_and_full() {
        let ring = IndexRing::released();
        assert!(ring.is_empty());
        assert!(ring.is_full());
        assert_eq!(ring.length(), 0);
    }

    #[test]
    fn test_put_take_single_slot_round_trip() {
        let mut ring = IndexRing::new(4).unwrap();
        ring.put(page(42)).unwrap();
        let out = ring.take().unwrap();
        assert_eq!(out.handle().raw(), 42);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut ring = IndexRing::new(3).unwrap();
        for n in 1..=3 {
            ring.put(page(n)).unwrap();
        }
        for n in 1..=3 {
            assert_eq!(ring.take().unwrap().handle().raw(), n);
        }
    }

    #[test]
    fn test_put_on_full_returns_page() {
        let mut ring = IndexRing::new(2).unwrap();
        ring.put(page(1)).unwrap();
        ring.put(page(2)).unwrap();
        assert!(ring.is_full());

        let rejected = ring.put(page(3)).unwrap_err();
        assert_eq!(rejected.handle().raw(), 3);
        assert_eq!(ring.count(), 2);
    }

    #[test]
    fn test_put_on_released_storage_rejected() {
        let mut ring = IndexRing::released();
        let rejected = ring.put(page(1)).unwrap_err();
        assert_eq!(rejected.handle().raw(), 1);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = IndexRing::new(2).unwrap();
        // Cycle enough times to wrap both indices repeatedly.
        for n in 0..10u64 {
            ring.put(page(n)).unwrap();
            assert_eq!(ring.take().unwrap().handle().raw(), n);
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_count_tracks_fills_minus_allocs() {
        let mut ring = IndexRing::new(8).unwrap();
        for n in 0..5u64 {
            ring.put(page(n)).unwrap();
        }
        assert_eq!(ring.count(), 5);
        ring.take().unwrap();
        ring.take().unwrap();
        assert_eq!(ring.count(), 3);
        assert_eq!(ring.free_space(), 5);
    }

    #[test]
    fn test_interleaved_full_empty_transitions() {
        let mut ring = IndexRing::new(1).unwrap();
        assert!(ring.is_empty());
        ring.put(page(1)).unwrap();
        assert!(ring.is_full());
        assert!(!ring.is_empty());
        ring.take().unwrap();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
    }
}
