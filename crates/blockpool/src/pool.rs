//! Main block pool implementation
//!
//! A pool allocator for fixed-size blocks carved out of one arena.
//!
//! # Memory Layout
//! ```text
//! [Block0][Block1][Block2][Block3]...[BlockN]
//!    ↓       ↓       ↓       ↓           ↓
//! [free] → [free] → [used] → [free] → [used] → end
//! ```
//!
//! The first `size_of::<usize>()` bytes of every free block store the index of
//! the next free block, or `usize::MAX` at the end of the list.
//!
//! ## Invariants
//!
//! - Every block is either linked into the free list or handed out, never both
//! - Every link followed is checked to lie inside the arena
//! - `free_len` plus allocated blocks equals `block_count` (checked mode)
//! - Block contents are only reachable through borrows of the pool, so
//!   `deallocate(&mut self)` cannot run while a block is borrowed

use core::alloc::Layout;

use crate::arena::Arena;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::handle::{BlockHandle, NO_BLOCK, next_pool_id};
use crate::stats::PoolStats;
use crate::store::{BackingStore, SystemStore};
use crate::utils::{MAX_NATURAL_ALIGN, natural_align};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Size of the free-list link kept in the first bytes of a free block
pub const LINK_SIZE: usize = size_of::<usize>();

/// Validates pool dimensions and computes the arena layout.
pub(crate) fn arena_layout(
    block_size: usize,
    block_count: usize,
    max_blocks: usize,
) -> PoolResult<Layout> {
    if block_size == 0 {
        return Err(PoolError::invalid_config("block size must be non-zero"));
    }
    if block_count == 0 {
        return Err(PoolError::invalid_config("block count must be non-zero"));
    }
    if block_size < LINK_SIZE {
        return Err(PoolError::invalid_config(format!(
            "block size {block_size} cannot hold a {LINK_SIZE}-byte free-list link"
        )));
    }
    if block_count > max_blocks {
        return Err(PoolError::invalid_config(format!(
            "block count {block_count} exceeds maximum {max_blocks}"
        )));
    }

    let total_size = block_size
        .checked_mul(block_count)
        .ok_or_else(|| PoolError::invalid_config("arena size overflows usize"))?;

    Layout::from_size_align(total_size, natural_align(block_size))
        .map_err(|_| PoolError::invalid_config("arena size exceeds isize::MAX"))
}

/// Per-slot bookkeeping, kept out of band so it survives callers writing
/// over the whole block.
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    allocated: bool,
}

#[derive(Debug, Default)]
struct Counters {
    total_allocs: u64,
    total_deallocs: u64,
    failed_allocs: u64,
    peak_allocated: usize,
}

/// Fixed-size block pool
///
/// Hands out blocks of `block_size` bytes from a single arena in O(1),
/// reusing the most recently freed block first.
///
/// ```
/// use nebula_blockpool::{BlockPool, PoolError};
///
/// let mut pool = BlockPool::new(16, 2)?;
/// let a = pool.allocate()?;
/// let b = pool.allocate()?;
/// assert!(matches!(pool.allocate(), Err(PoolError::Exhausted { .. })));
///
/// pool.block_mut(a)?[0] = 42;
/// assert_eq!(pool.block(a)?[0], 42);
///
/// pool.deallocate(b)?;
/// assert_eq!(pool.allocate()?.index(), b.index());
/// # Ok::<(), PoolError>(())
/// ```
pub struct BlockPool<S: BackingStore = SystemStore> {
    arena: Arena<S>,
    slots: Vec<Slot>,
    block_size: usize,
    block_count: usize,
    free_head: usize,
    free_len: usize,
    id: u32,
    config: PoolConfig,
    counters: Counters,
}

impl BlockPool<SystemStore> {
    /// Creates a pool of `block_count` blocks of `block_size` bytes each
    ///
    /// # Errors
    /// - `InvalidConfiguration` if either dimension is zero, `block_size` is
    ///   smaller than a free-list link, or the arena size overflows
    /// - `OutOfMemory` if the process heap cannot supply the arena
    pub fn new(block_size: usize, block_count: usize) -> PoolResult<Self> {
        Self::with_config(block_size, block_count, PoolConfig::default())
    }

    /// Creates a pool with custom configuration
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        Self::with_store(block_size, block_count, config, SystemStore)
    }

    /// Creates a pool whose blocks can each hold one `T`
    ///
    /// The block size is rounded up to a multiple of `T`'s alignment and to
    /// at least one free-list link.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `T` needs more than [`MAX_NATURAL_ALIGN`]
    /// bytes of alignment, which the arena never provides.
    pub fn for_type<T>(block_count: usize) -> PoolResult<Self> {
        let layout = Layout::new::<T>();
        if layout.align() > MAX_NATURAL_ALIGN {
            return Err(PoolError::invalid_config(format!(
                "type alignment {} exceeds maximum block alignment {MAX_NATURAL_ALIGN}",
                layout.align()
            )));
        }
        let size = layout.size().max(LINK_SIZE);
        let block_size = size.next_multiple_of(layout.align());
        Self::new(block_size, block_count)
    }
}

impl<S: BackingStore> BlockPool<S> {
    /// Creates a pool backed by `store`
    ///
    /// The store is asked for exactly one region here and gets it back
    /// exactly once when the pool is dropped.
    pub fn with_store(
        block_size: usize,
        block_count: usize,
        config: PoolConfig,
        store: S,
    ) -> PoolResult<Self> {
        let layout = arena_layout(block_size, block_count, NO_BLOCK - 1)?;
        let arena = Arena::reserve(store, layout)?;

        let mut pool = Self {
            arena,
            slots: vec![Slot::default(); block_count],
            block_size,
            block_count,
            free_head: NO_BLOCK,
            free_len: 0,
            id: next_pool_id(),
            config,
            counters: Counters::default(),
        };

        if let Some(pattern) = pool.config.alloc_pattern {
            pool.arena.as_mut_slice().fill(pattern);
        }
        pool.thread_free_list();

        #[cfg(feature = "logging")]
        debug!(
            pool = pool.id,
            block_size,
            block_count,
            hardening = ?pool.config.hardening,
            "Block pool created"
        );

        Ok(pool)
    }

    /// Returns the size of each block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the total number of blocks in the pool
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Returns the total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Returns the number of free blocks
    pub fn free_blocks(&self) -> usize {
        self.free_len
    }

    /// Returns the number of allocated blocks
    pub fn allocated_blocks(&self) -> usize {
        self.block_count.saturating_sub(self.free_len)
    }

    /// Checks if the pool is full (no free blocks)
    pub fn is_full(&self) -> bool {
        self.free_head == NO_BLOCK
    }

    /// Checks if the pool is empty (all blocks free)
    pub fn is_empty(&self) -> bool {
        self.allocated_blocks() == 0
    }

    /// Identity stamped into every handle this pool issues
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Configuration the pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Checks if a pointer belongs to this pool's arena
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.arena.contains(ptr)
    }

    /// Start address of the block a handle names
    ///
    /// The address is only meaningful while the pool is alive; use it for
    /// identity and range checks, not for access.
    ///
    /// Returns `None` for the null handle and for handles of other pools.
    pub fn block_ptr(&self, handle: BlockHandle) -> Option<*const u8> {
        let index = self.index_of(handle)?;
        Some(self.arena.as_ptr().wrapping_add(index * self.block_size).cast_const())
    }

    /// Checks if a handle names a block currently handed out under that handle
    pub fn is_allocated(&self, handle: BlockHandle) -> bool {
        self.index_of(handle).is_some_and(|index| {
            let slot = self.slots[index];
            slot.allocated && slot.generation == handle.generation()
        })
    }

    /// Takes a block from the head of the free list
    ///
    /// The block's contents are unspecified until written.
    ///
    /// # Errors
    /// - `Exhausted` if no block is free
    /// - `Corruption` if the free list points outside the arena
    pub fn allocate(&mut self) -> PoolResult<BlockHandle> {
        let Some(index) = self.pop_free()? else {
            self.counters.failed_allocs += 1;
            return Err(PoolError::exhausted(self.block_count));
        };

        let slot = &mut self.slots[index];
        slot.allocated = true;
        let generation = slot.generation;

        if let Some(pattern) = self.config.alloc_pattern {
            self.block_bytes_mut(index).fill(pattern);
        }

        if self.config.track_stats {
            self.counters.total_allocs += 1;
            self.counters.peak_allocated = self.counters.peak_allocated.max(self.allocated_blocks());
        }

        #[cfg(feature = "logging")]
        trace!(pool = self.id, index, generation, "Block allocated");

        Ok(BlockHandle::new(self.id, index, generation))
    }

    /// Returns a block to the head of the free list
    ///
    /// Deallocating [`BlockHandle::NULL`] does nothing.
    ///
    /// # Errors
    /// - `InvalidHandle` if the handle is out of range or from another pool
    /// - `DoubleFree` / `UseAfterFree` in checked mode if the handle is not live
    pub fn deallocate(&mut self, handle: BlockHandle) -> PoolResult<()> {
        if handle.is_null() {
            return Ok(());
        }

        let index = self.check_handle(handle)?;
        if self.config.hardening.is_checked() {
            self.check_free(index, handle)?;
        }

        let slot = &mut self.slots[index];
        slot.allocated = false;
        slot.generation = slot.generation.wrapping_add(1);

        if let Some(pattern) = self.config.dealloc_pattern {
            self.block_bytes_mut(index)[LINK_SIZE..].fill(pattern);
        }
        self.push_free(index);

        if self.config.track_stats {
            self.counters.total_deallocs += 1;
        }

        #[cfg(feature = "logging")]
        trace!(pool = self.id, index, "Block deallocated");

        Ok(())
    }

    /// Shared view of an allocated block
    pub fn block(&self, handle: BlockHandle) -> PoolResult<&[u8]> {
        let index = self.check_access(handle)?;
        let start = index * self.block_size;
        Ok(&self.arena.as_slice()[start..start + self.block_size])
    }

    /// Exclusive view of an allocated block
    pub fn block_mut(&mut self, handle: BlockHandle) -> PoolResult<&mut [u8]> {
        let index = self.check_access(handle)?;
        Ok(self.block_bytes_mut(index))
    }

    /// Maps a raw address back to the handle of the block that starts there
    ///
    /// # Errors
    /// `InvalidHandle` if the address is outside the arena, not on a block
    /// boundary, or (checked mode) names a block that is not allocated.
    pub fn handle_for_ptr(&self, ptr: *const u8) -> PoolResult<BlockHandle> {
        if !self.arena.contains(ptr) {
            return Err(PoolError::invalid_handle("address outside the pool arena"));
        }

        let offset = ptr as usize - self.arena.as_ptr() as usize;
        if !offset.is_multiple_of(self.block_size) {
            return Err(PoolError::invalid_handle("address not on a block boundary"));
        }

        let index = offset / self.block_size;
        let slot = self.slots[index];
        if self.config.hardening.is_checked() && !slot.allocated {
            return Err(PoolError::invalid_handle("block is not allocated"));
        }
        Ok(BlockHandle::new(self.id, index, slot.generation))
    }

    /// Returns every block to the free list
    ///
    /// All outstanding handles become stale; in checked mode using them
    /// afterwards reports `UseAfterFree`.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            if slot.allocated {
                slot.allocated = false;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.thread_free_list();
        self.counters = Counters::default();

        #[cfg(feature = "logging")]
        debug!(pool = self.id, "Block pool reset");
    }

    /// Walks the free list and checks the pool invariants
    ///
    /// O(`block_count`); meant for tests and debugging.
    ///
    /// # Errors
    /// `Corruption` describing the first violation found.
    pub fn validate(&self) -> PoolResult<()> {
        let mut seen = vec![false; self.block_count];
        let mut listed = 0usize;
        let mut cursor = self.free_head;

        while cursor != NO_BLOCK {
            if cursor >= self.block_count {
                return Err(PoolError::corruption(format!(
                    "link to block {cursor} outside arena"
                )));
            }
            if seen[cursor] {
                return Err(PoolError::corruption(format!("cycle through block {cursor}")));
            }
            if self.slots[cursor].allocated {
                return Err(PoolError::corruption(format!(
                    "allocated block {cursor} is linked as free"
                )));
            }
            seen[cursor] = true;
            listed += 1;
            cursor = self.read_link(cursor);
        }

        if listed != self.free_len {
            return Err(PoolError::corruption(format!(
                "free list holds {listed} blocks, expected {}",
                self.free_len
            )));
        }

        let allocated = self.slots.iter().filter(|slot| slot.allocated).count();
        if allocated + listed != self.block_count {
            return Err(PoolError::corruption(format!(
                "{allocated} allocated + {listed} free != {} blocks",
                self.block_count
            )));
        }

        Ok(())
    }

    /// Get statistics (if tracking is enabled)
    pub fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }

        Some(PoolStats {
            total_allocs: self.counters.total_allocs,
            total_deallocs: self.counters.total_deallocs,
            failed_allocs: self.counters.failed_allocs,
            peak_allocated: self.counters.peak_allocated,
            allocated_blocks: self.allocated_blocks(),
            free_blocks: self.free_blocks(),
            block_size: self.block_size,
            block_count: self.block_count,
        })
    }

    /// Links every block in ascending order: 0 → 1 → … → end
    fn thread_free_list(&mut self) {
        for index in 0..self.block_count {
            let next = if index + 1 < self.block_count {
                index + 1
            } else {
                NO_BLOCK
            };
            self.write_link(index, next);
        }
        self.free_head = 0;
        self.free_len = self.block_count;
    }

    fn pop_free(&mut self) -> PoolResult<Option<usize>> {
        let head = self.free_head;
        if head == NO_BLOCK {
            return Ok(None);
        }

        let next = self.read_link(head);
        if next != NO_BLOCK && next >= self.block_count {
            return Err(PoolError::corruption(format!(
                "block {head} links to {next}, outside {} blocks",
                self.block_count
            )));
        }
        if self.config.hardening.is_checked() && self.slots[head].allocated {
            return Err(PoolError::corruption(format!(
                "allocated block {head} found at free list head"
            )));
        }

        self.free_head = next;
        self.free_len = self.free_len.saturating_sub(1);
        Ok(Some(head))
    }

    fn push_free(&mut self, index: usize) {
        self.write_link(index, self.free_head);
        self.free_head = index;
        self.free_len += 1;
    }

    /// Pool identity and range check for queries; never logs
    fn index_of(&self, handle: BlockHandle) -> Option<usize> {
        let index = handle.index();
        (!handle.is_null() && handle.pool_id() == self.id && index < self.block_count)
            .then_some(index)
    }

    /// Pool identity and range check shared by every handle-taking operation
    fn check_handle(&self, handle: BlockHandle) -> PoolResult<usize> {
        if handle.is_null() {
            return Err(PoolError::invalid_handle("null handle"));
        }
        if handle.pool_id() != self.id {
            return Err(PoolError::invalid_handle("handle belongs to a different pool"));
        }
        if handle.index() >= self.block_count {
            return Err(PoolError::invalid_handle(format!(
                "block index {} outside {} blocks",
                handle.index(),
                self.block_count
            )));
        }
        Ok(handle.index())
    }

    fn check_free(&self, index: usize, handle: BlockHandle) -> PoolResult<()> {
        let slot = self.slots[index];
        if slot.allocated && slot.generation == handle.generation() {
            return Ok(());
        }
        if !slot.allocated && slot.generation == handle.generation().wrapping_add(1) {
            return Err(PoolError::double_free(index));
        }
        Err(PoolError::use_after_free(
            index,
            handle.generation(),
            slot.generation,
        ))
    }

    fn check_access(&self, handle: BlockHandle) -> PoolResult<usize> {
        let index = self.check_handle(handle)?;
        if self.config.hardening.is_checked() {
            let slot = self.slots[index];
            if !slot.allocated || slot.generation != handle.generation() {
                return Err(PoolError::use_after_free(
                    index,
                    handle.generation(),
                    slot.generation,
                ));
            }
        }
        Ok(index)
    }

    fn block_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.block_size;
        &mut self.arena.as_mut_slice()[start..start + self.block_size]
    }

    fn read_link(&self, index: usize) -> usize {
        let start = index * self.block_size;
        let mut bytes = [0u8; LINK_SIZE];
        bytes.copy_from_slice(&self.arena.as_slice()[start..start + LINK_SIZE]);
        usize::from_ne_bytes(bytes)
    }

    fn write_link(&mut self, index: usize, next: usize) {
        let start = index * self.block_size;
        self.arena.as_mut_slice()[start..start + LINK_SIZE].copy_from_slice(&next.to_ne_bytes());
    }
}

impl<S: BackingStore> Drop for BlockPool<S> {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        debug!(
            pool = self.id,
            outstanding = self.allocated_blocks(),
            "Block pool dropped"
        );
    }
}

impl<S: BackingStore> core::fmt::Debug for BlockPool<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockPool")
            .field("id", &self.id)
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("free_blocks", &self.free_len)
            .field("hardening", &self.config.hardening)
            .finish()
    }
}
