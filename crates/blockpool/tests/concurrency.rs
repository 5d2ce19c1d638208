//! Multi-threaded tests for the shared pool strategies.
//!
//! Each worker stamps the blocks it holds with its own id and checks the
//! stamp is still intact before giving the block back; a block handed to two
//! workers at once would show a foreign stamp.

use std::sync::{Arc, Barrier};
use std::thread;

use nebula_blockpool::{AtomicBlockPool, PoolConfig, PoolError, SyncBlockPool};

const THREADS: usize = 8;
const ROUNDS: usize = 500;
const BLOCKS: usize = 16;
const BLOCK_SIZE: usize = 32;

#[test]
fn atomic_pool_never_shares_a_live_block() {
    let pool = Arc::new(AtomicBlockPool::with_config(BLOCK_SIZE, BLOCKS, PoolConfig::debug()).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let stamp = worker as u8 + 1;
                for _ in 0..ROUNDS {
                    let mut held = Vec::new();
                    for _ in 0..3 {
                        match pool.allocate() {
                            Ok(mut block) => {
                                block.fill(stamp);
                                held.push(block);
                            }
                            Err(PoolError::Exhausted { .. }) => break,
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                    thread::yield_now();
                    for block in &held {
                        assert!(block.iter().all(|&b| b == stamp));
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(pool.free_blocks(), BLOCKS);
    let stats = pool.stats().unwrap();
    assert_eq!(stats.total_allocs, stats.total_deallocs);
    assert!(stats.peak_allocated <= BLOCKS);

    // every block is reachable again
    let all: Vec<_> = (0..BLOCKS).map(|_| pool.allocate().unwrap()).collect();
    let mut indices: Vec<_> = all.iter().map(|b| b.index()).collect();
    indices.sort_unstable();
    indices.dedup();
    assert_eq!(indices.len(), BLOCKS);
}

#[test]
fn sync_pool_never_shares_a_live_block() {
    let pool = Arc::new(SyncBlockPool::with_config(BLOCK_SIZE, BLOCKS, PoolConfig::debug()).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let stamp = worker as u8 + 1;
                for _ in 0..ROUNDS {
                    let handle = match pool.allocate() {
                        Ok(handle) => handle,
                        Err(error) => {
                            assert!(error.is_retryable());
                            continue;
                        }
                    };
                    pool.with_block_mut(handle, |bytes| bytes.fill(stamp)).unwrap();
                    thread::yield_now();
                    let intact = pool
                        .with_block(handle, |bytes| bytes.iter().all(|&b| b == stamp))
                        .unwrap();
                    assert!(intact);
                    pool.deallocate(handle).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(pool.free_blocks(), BLOCKS);
    pool.validate().unwrap();
}
