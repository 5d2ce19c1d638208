//! Mutex-guarded block pool
//!
//! Wraps a [`BlockPool`] in a `parking_lot::Mutex` so it can be shared
//! between threads. Every operation holds the lock for exactly its own
//! duration; block contents are only reachable inside closures so no borrow
//! escapes the critical section.

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::PoolResult;
use crate::handle::BlockHandle;
use crate::pool::BlockPool;
use crate::stats::PoolStats;
use crate::store::{BackingStore, SystemStore};

/// Thread-safe block pool using a lock around the free list
pub struct SyncBlockPool<S: BackingStore = SystemStore> {
    inner: Mutex<BlockPool<S>>,
}

impl SyncBlockPool<SystemStore> {
    /// Creates a shared pool with default configuration
    pub fn new(block_size: usize, block_count: usize) -> PoolResult<Self> {
        BlockPool::new(block_size, block_count).map(Self::from_pool)
    }

    /// Creates a shared pool with custom configuration
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        BlockPool::with_config(block_size, block_count, config).map(Self::from_pool)
    }
}

impl<S: BackingStore> SyncBlockPool<S> {
    /// Shares an existing pool
    pub fn from_pool(pool: BlockPool<S>) -> Self {
        Self {
            inner: Mutex::new(pool),
        }
    }

    /// See [`BlockPool::allocate`]
    pub fn allocate(&self) -> PoolResult<BlockHandle> {
        self.inner.lock().allocate()
    }

    /// See [`BlockPool::deallocate`]
    pub fn deallocate(&self, handle: BlockHandle) -> PoolResult<()> {
        self.inner.lock().deallocate(handle)
    }

    /// Runs `f` over the contents of an allocated block
    ///
    /// # Deadlocks
    /// `f` runs while the pool lock is held. Calling back into this pool
    /// from inside `f` deadlocks.
    pub fn with_block<R>(&self, handle: BlockHandle, f: impl FnOnce(&[u8]) -> R) -> PoolResult<R> {
        let pool = self.inner.lock();
        pool.block(handle).map(f)
    }

    /// Runs `f` over the mutable contents of an allocated block
    ///
    /// # Deadlocks
    /// Same as [`with_block`](Self::with_block): `f` must not touch this pool.
    pub fn with_block_mut<R>(
        &self,
        handle: BlockHandle,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> PoolResult<R> {
        let mut pool = self.inner.lock();
        pool.block_mut(handle).map(f)
    }

    /// Returns the number of free blocks
    pub fn free_blocks(&self) -> usize {
        self.inner.lock().free_blocks()
    }

    /// Returns the number of allocated blocks
    pub fn allocated_blocks(&self) -> usize {
        self.inner.lock().allocated_blocks()
    }

    /// See [`BlockPool::stats`]
    pub fn stats(&self) -> Option<PoolStats> {
        self.inner.lock().stats()
    }

    /// See [`BlockPool::validate`]
    pub fn validate(&self) -> PoolResult<()> {
        self.inner.lock().validate()
    }

    /// Exclusive access to the wrapped pool without locking
    pub fn get_mut(&mut self) -> &mut BlockPool<S> {
        self.inner.get_mut()
    }

    /// Unwraps the pool
    pub fn into_inner(self) -> BlockPool<S> {
        self.inner.into_inner()
    }
}

impl<S: BackingStore> From<BlockPool<S>> for SyncBlockPool<S> {
    fn from(pool: BlockPool<S>) -> Self {
        Self::from_pool(pool)
    }
}

impl<S: BackingStore> core::fmt::Debug for SyncBlockPool<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.inner.try_lock() {
            Some(pool) => f.debug_tuple("SyncBlockPool").field(&*pool).finish(),
            None => f.write_str("SyncBlockPool(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_send_sync_bounds() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SyncBlockPool>();
        assert_sync::<SyncBlockPool>();
    }

    #[test]
    fn test_closures_see_block_contents() {
        let pool = SyncBlockPool::new(16, 2).unwrap();
        let handle = pool.allocate().unwrap();
        pool.with_block_mut(handle, |bytes| bytes[..4].copy_from_slice(&[1, 2, 3, 4]))
            .unwrap();
        let head = pool.with_block(handle, |bytes| bytes[..4].to_vec()).unwrap();
        assert_eq!(head, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = Arc::new(SyncBlockPool::new(16, 64).unwrap());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let handle = pool.allocate().unwrap();
                        pool.deallocate(handle).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(pool.free_blocks(), 64);
        pool.validate().unwrap();
    }
}
