//! Backing-store providers
//!
//! A pool asks its store for exactly one region when it is built and hands
//! that region back exactly once when it is dropped. Stores are never asked
//! for individual blocks.

use core::alloc::Layout;
use core::ptr::NonNull;

/// Supplier of the raw region an arena is carved from
///
/// # Safety
///
/// Implementations must return either `None` or a pointer to a region that is
/// valid for reads and writes of `layout.size()` bytes, aligned to
/// `layout.align()`, and not used by anything else until it is passed back to
/// [`BackingStore::release`] with the same layout. The bytes of the region
/// must be initialized (any value).
pub unsafe trait BackingStore {
    /// Reserves one contiguous region, or `None` if the store is out of memory
    fn reserve(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a region obtained from [`BackingStore::reserve`]
    ///
    /// # Safety
    ///
    /// `ptr` must come from `reserve` on this store with the same `layout`,
    /// and must not be released twice.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Process heap via the global allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStore;

// SAFETY: SystemStore hands out zero-initialized regions from the global
// allocator with the requested layout and frees them with the same layout.
unsafe impl BackingStore for SystemStore {
    fn reserve(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has non-zero size (checked above).
        NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr/layout come from reserve() above,
        // which used the global allocator with the same layout.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// SAFETY: a shared reference forwards to the referenced store unchanged.
unsafe impl<S: BackingStore + ?Sized> BackingStore for &S {
    fn reserve(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).reserve(layout)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr, layout) }
    }
}
