//! Stores 3D points in a block pool and hands them back.
//!
//! Run with `cargo run -p nebula-blockpool --example points`.

use nebula_blockpool::prelude::*;
use tracing::{Level, info};

#[derive(Debug, Clone, Copy)]
struct Point {
    x: i32,
    y: i32,
    z: i32,
}

impl Point {
    const SIZE: usize = 12;

    fn write_to(self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.x.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.y.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.z.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        let field = |at: usize| i32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            x: field(0),
            y: field(4),
            z: field(8),
        }
    }
}

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut pool = BlockPool::with_config(Point::SIZE, 10, PoolConfig::debug())?;

    let mut handles = Vec::new();
    for i in 0..5 {
        let handle = pool.allocate()?;
        Point {
            x: i,
            y: i * 2,
            z: i * 3,
        }
        .write_to(pool.block_mut(handle)?);
        handles.push(handle);
    }

    for &handle in &handles {
        let point = Point::read_from(pool.block(handle)?);
        info!(x = point.x, y = point.y, z = point.z, "Point");
    }

    for handle in handles {
        pool.deallocate(handle)?;
    }

    if let Some(stats) = pool.stats() {
        info!(
            allocs = stats.total_allocs,
            deallocs = stats.total_deallocs,
            peak = stats.peak_allocated,
            "Pool statistics"
        );
    }

    Ok(())
}
