//! The single contiguous region a pool carves its blocks from
//!
//! # Safety
//!
//! `Arena` is the only owner of the region it reserves:
//! - The region is reserved once in [`Arena::reserve`] and released once in `Drop`
//! - A failed reservation never produces an `Arena`, so nothing is released twice
//! - Shared and exclusive slice views follow `&self` / `&mut self`
//! - Raw access through [`Arena::as_ptr`] is left to callers that uphold
//!   disjointness themselves (the lock-free pool)

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::{PoolError, PoolResult};
use crate::store::{BackingStore, SystemStore};

#[cfg(feature = "logging")]
use tracing::trace;

/// Owned arena memory
pub struct Arena<S: BackingStore = SystemStore> {
    ptr: NonNull<u8>,
    layout: Layout,
    store: S,
}

impl<S: BackingStore> Arena<S> {
    /// Reserves `layout` from `store`
    ///
    /// # Errors
    /// Returns `OutOfMemory` if the store cannot supply the region.
    pub fn reserve(store: S, layout: Layout) -> PoolResult<Self> {
        let ptr = store
            .reserve(layout)
            .ok_or_else(|| PoolError::out_of_memory_with_layout(layout))?;

        #[cfg(feature = "logging")]
        trace!(size = layout.size(), align = layout.align(), "Arena reserved");

        Ok(Self { ptr, layout, store })
    }

    /// Size of the region in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always false: stores never hand out empty regions to a pool
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Layout the region was reserved with
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The backing store this region came from
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start address of the region
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Checks if an address falls inside the region
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.ptr.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr - start < self.layout.size()
    }

    /// Shared view over the whole region
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: Creating a shared slice over the owned region.
        // - ptr is valid for layout.size() initialized bytes (BackingStore contract)
        // - &self prevents a concurrent &mut view
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    /// Exclusive view over the whole region
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: Creating an exclusive slice over the owned region.
        // - ptr is valid for layout.size() initialized bytes (BackingStore contract)
        // - &mut self guarantees no other view exists
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl<S: BackingStore> Drop for Arena<S> {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        trace!(size = self.layout.size(), "Arena released");

        // SAFETY: Returning the region to the store it came from.
        // - ptr/layout are exactly what reserve() returned and was asked for
        // - Drop runs once, so the region is released once
        unsafe { self.store.release(self.ptr, self.layout) }
    }
}

impl<S: BackingStore> core::fmt::Debug for Arena<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("ptr", &self.ptr)
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}

// SAFETY: Arena is Send if its store is Send.
// - The region is exclusively owned; moving the Arena moves that ownership
// - No thread-local state is tied to the pointer
unsafe impl<S: BackingStore + Send> Send for Arena<S> {}

// SAFETY: Arena is Sync if its store is Sync.
// - &self only yields a shared slice or a raw pointer
// - Writing through the raw pointer is unsafe and callers synchronize it
unsafe impl<S: BackingStore + Sync> Sync for Arena<S> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_views() {
        let layout = Layout::from_size_align(64, 8).unwrap();
        let mut arena = Arena::reserve(SystemStore, layout).unwrap();
        assert_eq!(arena.len(), 64);
        assert!(!arena.is_empty());

        arena.as_mut_slice()[10] = 7;
        assert_eq!(arena.as_slice()[10], 7);

        let start = arena.as_ptr();
        assert!(arena.contains(start));
        assert!(arena.contains(start.wrapping_add(63)));
        assert!(!arena.contains(start.wrapping_add(64)));
    }

    #[test]
    fn test_send_sync_bounds() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Arena>();
        assert_sync::<Arena>();
    }
}
