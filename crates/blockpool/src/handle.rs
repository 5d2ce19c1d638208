//! Block handles
//!
//! A handle names one block of one pool under one generation. It is a plain
//! `Copy` value: holding it grants nothing, every access goes back through the
//! pool that issued it.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Index value used for the null handle and the end of a free list
pub(crate) const NO_BLOCK: usize = usize::MAX;

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Hands out a fresh identity for a new pool. Zero is reserved for the null handle.
pub(crate) fn next_pool_id() -> u32 {
    loop {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}

/// Opaque identifier of an allocated block
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pool: u32,
    generation: u32,
    index: usize,
}

impl BlockHandle {
    /// The handle that names nothing. Deallocating it is a no-op.
    pub const NULL: Self = Self {
        pool: 0,
        generation: 0,
        index: NO_BLOCK,
    };

    #[inline]
    pub(crate) const fn new(pool: u32, index: usize, generation: u32) -> Self {
        Self {
            pool,
            generation,
            index,
        }
    }

    /// Position of the block inside its arena
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot at the time the block was handed out
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Identity of the issuing pool
    #[inline]
    pub const fn pool_id(&self) -> u32 {
        self.pool
    }

    /// Returns true for [`BlockHandle::NULL`]
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.pool == 0 && self.index == NO_BLOCK
    }
}

impl Default for BlockHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("BlockHandle(null)");
        }
        write!(
            f,
            "BlockHandle(pool={}, index={}, gen={})",
            self.pool, self.index, self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(BlockHandle::NULL.is_null());
        assert!(BlockHandle::default().is_null());
        assert!(!BlockHandle::new(1, 0, 0).is_null());
        assert_eq!(format!("{:?}", BlockHandle::NULL), "BlockHandle(null)");
    }

    #[test]
    fn test_pool_ids_are_unique_and_non_zero() {
        let a = next_pool_id();
        let b = next_pool_id();
        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        let first = BlockHandle::new(7, 3, 0);
        let second = BlockHandle::new(7, 3, 1);
        assert_ne!(first, second);
        assert_eq!(first.index(), second.index());
    }
}
