//! Cross-store ID allocation (spec §9, §3 invariant 2): each store owns a
//! half-open integer range fixed at creation, enforced at insert time. No
//! coordination service needed because the ranges never overlap.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::StoreError;

pub struct IdAllocator {
    store_name: String,
    next: AtomicI64,
    upper_bound_exclusive: i64,
}

impl IdAllocator {
    /// `range` is `(lo, hi)`, half-open `[lo, hi)`. `high_water` is the
    /// current max `global_profile_id` already present in the store, or
    /// `range.0 - 1` for a fresh store.
    pub fn new(store_name: impl Into<String>, range: (i64, i64), high_water: i64) -> Self {
        let (lo, hi) = range;
        let start = high_water.max(lo - 1) + 1;
        Self { store_name: store_name.into(), next: AtomicI64::new(start), upper_bound_exclusive: hi }
    }

    pub fn allocate(&self) -> Result<i64, StoreError> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if id >= self.upper_bound_exclusive {
            return Err(StoreError::IdRangeExhausted { store: self.store_name.clone() });
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_from_range_start() {
        let allocator = IdAllocator::new("dev", (1, 100), 0);
        assert_eq!(allocator.allocate().unwrap(), 1);
        assert_eq!(allocator.allocate().unwrap(), 2);
    }

    #[test]
    fn resumes_above_existing_high_water_mark() {
        let allocator = IdAllocator::new("dev", (1, 100), 42);
        assert_eq!(allocator.allocate().unwrap(), 43);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let allocator = IdAllocator::new("dev", (1, 3), 0);
        assert_eq!(allocator.allocate().unwrap(), 1);
        assert_eq!(allocator.allocate().unwrap(), 2);
        assert!(allocator.allocate().is_err());
    }

    #[test]
    fn dev_and_live_ranges_never_collide() {
        let dev = IdAllocator::new("dev", (1, 1_000_000_000), 0);
        let live = IdAllocator::new("live", (1_000_000_000, 2_000_000_000), 0);
        assert_ne!(dev.allocate().unwrap(), live.allocate().unwrap());
    }
}
