//! Lock-free block pool
//!
//! # Safety
//!
//! This module implements a thread-safe pool using a Treiber stack:
//! - The head is an `AtomicU64` packing a block index (low half) and an ABA
//!   tag (high half) that changes on every successful CAS
//! - Next links live in a side table of `AtomicU32`, not inside the blocks,
//!   because a popper may read the link of a block another thread has just
//!   taken and is writing into
//! - Blocks are handed out as [`PooledBlock`] guards; a guard is the only way
//!   to reach a block's bytes and returns the block when dropped
//!
//! ## Invariants
//!
//! - At most one `PooledBlock` exists per block index
//! - Release (push) happens-before the next Acquire (pop) of the same block,
//!   so writes made through a guard are visible to the next owner
//! - `free_count` tracks free blocks for O(1) queries; it is bumped before a
//!   push and dropped after a pop, so it never undercounts the list

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::arena::Arena;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::arena_layout;
use crate::stats::PoolStats;
use crate::store::{BackingStore, SystemStore};
use crate::utils::Backoff;

#[cfg(feature = "logging")]
use tracing::debug;

/// End of the free list
const NIL: u32 = u32::MAX;

#[inline]
fn pack(index: u32, tag: u32) -> u64 {
    (u64::from(tag) << 32) | u64::from(index)
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    (word as u32, (word >> 32) as u32)
}

/// Lock-free fixed-size block pool
///
/// ```
/// use nebula_blockpool::AtomicBlockPool;
///
/// let pool = AtomicBlockPool::new(16, 4)?;
/// let mut block = pool.allocate()?;
/// block[0] = 7;
/// assert_eq!(pool.free_blocks(), 3);
/// drop(block);
/// assert_eq!(pool.free_blocks(), 4);
/// # Ok::<(), nebula_blockpool::PoolError>(())
/// ```
pub struct AtomicBlockPool<S: BackingStore = SystemStore> {
    arena: Arena<S>,
    next: Box<[AtomicU32]>,
    head: AtomicU64,
    free_count: AtomicUsize,
    block_size: usize,
    block_count: usize,
    config: PoolConfig,

    total_allocs: AtomicU64,
    total_deallocs: AtomicU64,
    failed_allocs: AtomicU64,
    peak_allocated: AtomicUsize,
}

impl AtomicBlockPool<SystemStore> {
    /// Creates a lock-free pool with default configuration
    pub fn new(block_size: usize, block_count: usize) -> PoolResult<Self> {
        Self::with_config(block_size, block_count, PoolConfig::default())
    }

    /// Creates a lock-free pool with custom configuration
    ///
    /// Only the fill patterns and `track_stats` apply; handles cannot be
    /// misused, so there is nothing for hardening to check.
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        Self::with_store(block_size, block_count, config, SystemStore)
    }
}

impl<S: BackingStore> AtomicBlockPool<S> {
    /// Creates a lock-free pool backed by `store`
    ///
    /// # Errors
    /// As [`BlockPool::with_store`](crate::BlockPool::with_store), plus
    /// `InvalidConfiguration` if `block_count` does not fit the 32-bit index.
    pub fn with_store(
        block_size: usize,
        block_count: usize,
        config: PoolConfig,
        store: S,
    ) -> PoolResult<Self> {
        let layout = arena_layout(block_size, block_count, NIL as usize)?;
        let mut arena = Arena::reserve(store, layout)?;
        if let Some(pattern) = config.alloc_pattern {
            arena.as_mut_slice().fill(pattern);
        }

        let next: Box<[AtomicU32]> = (0..block_count)
            .map(|index| {
                let next = if index + 1 < block_count {
                    (index + 1) as u32
                } else {
                    NIL
                };
                AtomicU32::new(next)
            })
            .collect();

        #[cfg(feature = "logging")]
        debug!(block_size, block_count, "Lock-free block pool created");

        Ok(Self {
            arena,
            next,
            head: AtomicU64::new(pack(0, 0)),
            free_count: AtomicUsize::new(block_count),
            block_size,
            block_count,
            config,
            total_allocs: AtomicU64::new(0),
            total_deallocs: AtomicU64::new(0),
            failed_allocs: AtomicU64::new(0),
            peak_allocated: AtomicUsize::new(0),
        })
    }

    /// Returns the size of each block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the total number of blocks in the pool
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Returns the number of free blocks (exact in absence of races)
    pub fn free_blocks(&self) -> usize {
        self.free_count.load(Ordering::Relaxed)
    }

    /// Returns the number of allocated blocks
    pub fn allocated_blocks(&self) -> usize {
        self.block_count.saturating_sub(self.free_blocks())
    }

    /// Checks if the pool is full (no free blocks)
    pub fn is_full(&self) -> bool {
        unpack(self.head.load(Ordering::Acquire)).0 == NIL
    }

    /// Pops a block off the free list
    ///
    /// # Errors
    /// `Exhausted` if no block is free at the moment of the attempt.
    pub fn allocate(&self) -> PoolResult<PooledBlock<'_, S>> {
        let mut backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Acquire);

        loop {
            let (index, tag) = unpack(current);
            if index == NIL {
                self.failed_allocs.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::exhausted(self.block_count));
            }

            // A stale read here is harmless: the tag makes the CAS fail.
            let next = self.next[index as usize].load(Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                current,
                pack(next, tag.wrapping_add(1)),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let free_before = self.free_count.fetch_sub(1, Ordering::Relaxed);
                    let allocated = (self.block_count + 1).saturating_sub(free_before);
                    if self.config.track_stats {
                        self.total_allocs.fetch_add(1, Ordering::Relaxed);
                        self.peak_allocated.fetch_max(allocated, Ordering::Relaxed);
                    }

                    let mut block = PooledBlock { pool: self, index };
                    if let Some(pattern) = self.config.alloc_pattern {
                        block.fill(pattern);
                    }
                    return Ok(block);
                }
                Err(actual) => {
                    current = actual;
                    backoff.spin_or_yield();
                }
            }
        }
    }

    fn release(&self, index: u32) {
        // Count before publishing so a racing pop never decrements below zero.
        self.free_count.fetch_add(1, Ordering::Relaxed);

        let mut backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Relaxed);

        loop {
            let (head, tag) = unpack(current);
            self.next[index as usize].store(head, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                current,
                pack(index, tag.wrapping_add(1)),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    current = actual;
                    backoff.spin_or_yield();
                }
            }
        }

        if self.config.track_stats {
            self.total_deallocs.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn block_ptr(&self, index: u32) -> *mut u8 {
        self.arena
            .as_ptr()
            .wrapping_add(index as usize * self.block_size)
    }

    /// Get statistics (if tracking is enabled)
    pub fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }

        Some(PoolStats {
            total_allocs: self.total_allocs.load(Ordering::Relaxed),
            total_deallocs: self.total_deallocs.load(Ordering::Relaxed),
            failed_allocs: self.failed_allocs.load(Ordering::Relaxed),
            peak_allocated: self.peak_allocated.load(Ordering::Relaxed),
            allocated_blocks: self.allocated_blocks(),
            free_blocks: self.free_blocks(),
            block_size: self.block_size,
            block_count: self.block_count,
        })
    }
}

impl<S: BackingStore> core::fmt::Debug for AtomicBlockPool<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtomicBlockPool")
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("free_blocks", &self.free_blocks())
            .finish()
    }
}

/// RAII guard for a block taken from an [`AtomicBlockPool`]
///
/// Derefs to the block's bytes and returns the block when dropped.
pub struct PooledBlock<'a, S: BackingStore = SystemStore> {
    pool: &'a AtomicBlockPool<S>,
    index: u32,
}

impl<S: BackingStore> PooledBlock<'_, S> {
    /// Position of the block inside the arena
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<S: BackingStore> Deref for PooledBlock<'_, S> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: Viewing the guarded block as a shared slice.
        // - index < block_count, so the block lies inside the arena
        // - This guard is the only handle to the block (popped exactly once)
        // - Lifetime tied to &self, the guard cannot be dropped meanwhile
        unsafe { core::slice::from_raw_parts(self.pool.block_ptr(self.index), self.pool.block_size) }
    }
}

impl<S: BackingStore> DerefMut for PooledBlock<'_, S> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: Viewing the guarded block as an exclusive slice.
        // - Same bounds argument as deref()
        // - &mut self ensures exclusive access (no aliasing)
        unsafe {
            core::slice::from_raw_parts_mut(self.pool.block_ptr(self.index), self.pool.block_size)
        }
    }
}

impl<S: BackingStore> Drop for PooledBlock<'_, S> {
    fn drop(&mut self) {
        if let Some(pattern) = self.pool.config.dealloc_pattern {
            self.fill(pattern);
        }
        self.pool.release(self.index);
    }
}

impl<S: BackingStore> core::fmt::Debug for PooledBlock<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledBlock")
            .field("index", &self.index)
            .field("len", &self.pool.block_size)
            .finish()
    }
}
