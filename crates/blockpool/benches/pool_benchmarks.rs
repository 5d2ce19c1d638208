//! Block pool benchmarks
//!
//! Compares the pool strategies against the system allocator for
//! same-sized allocations.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nebula_blockpool::{AtomicBlockPool, BlockPool, PoolConfig, SyncBlockPool};
use std::alloc::Layout;
use std::hint::black_box;

/// Benchmark single allocation/deallocation cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");

    group.bench_function("block_pool_checked_64b", |b| {
        let mut pool = BlockPool::with_config(64, 1024, PoolConfig::production()).unwrap();
        b.iter(|| {
            let handle = pool.allocate().unwrap();
            pool.deallocate(black_box(handle)).unwrap();
        });
    });

    group.bench_function("block_pool_unchecked_64b", |b| {
        let mut pool = BlockPool::with_config(64, 1024, PoolConfig::performance()).unwrap();
        b.iter(|| {
            let handle = pool.allocate().unwrap();
            pool.deallocate(black_box(handle)).unwrap();
        });
    });

    group.bench_function("sync_pool_64b", |b| {
        let pool = SyncBlockPool::with_config(64, 1024, PoolConfig::production()).unwrap();
        b.iter(|| {
            let handle = pool.allocate().unwrap();
            pool.deallocate(black_box(handle)).unwrap();
        });
    });

    group.bench_function("atomic_pool_64b", |b| {
        let pool = AtomicBlockPool::with_config(64, 1024, PoolConfig::production()).unwrap();
        b.iter(|| {
            let block = pool.allocate().unwrap();
            black_box(&block);
        });
    });

    // System allocator (baseline)
    group.bench_function("system_64b", |b| {
        let layout = Layout::from_size_align(64, 8).unwrap();

        b.iter(|| unsafe {
            let ptr = std::alloc::alloc(layout);
            std::alloc::dealloc(ptr, layout);
            black_box(ptr);
        });
    });

    group.finish();
}

/// Benchmark filling the pool and draining it again
fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_drain");

    for count in [64usize, 1024] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("block_pool", count), &count, |b, &count| {
            let mut pool = BlockPool::with_config(32, count, PoolConfig::performance()).unwrap();
            let mut handles = Vec::with_capacity(count);
            b.iter(|| {
                while let Ok(handle) = pool.allocate() {
                    handles.push(handle);
                }
                for handle in handles.drain(..) {
                    pool.deallocate(handle).unwrap();
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("atomic_pool", count), &count, |b, &count| {
            let pool = AtomicBlockPool::with_config(32, count, PoolConfig::performance()).unwrap();
            let mut blocks = Vec::with_capacity(count);
            b.iter(|| {
                while let Ok(block) = pool.allocate() {
                    blocks.push(block);
                }
                blocks.clear();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_allocation, bench_fill_drain);
criterion_main!(benches);
