//! Block pool statistics

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total successful allocations performed
    pub total_allocs: u64,
    /// Total deallocations performed
    pub total_deallocs: u64,
    /// Allocations refused because the pool was exhausted
    pub failed_allocs: u64,
    /// Highest number of simultaneously allocated blocks
    pub peak_allocated: usize,
    /// Currently allocated blocks
    pub allocated_blocks: usize,
    /// Currently free blocks
    pub free_blocks: usize,
    /// Size of each block
    pub block_size: usize,
    /// Total number of blocks
    pub block_count: usize,
}

impl PoolStats {
    /// Bytes currently handed out
    pub fn current_usage(&self) -> usize {
        self.allocated_blocks * self.block_size
    }

    /// Peak bytes handed out
    pub fn peak_usage(&self) -> usize {
        self.peak_allocated * self.block_size
    }

    /// Fraction of blocks currently allocated, in `0.0..=1.0`
    pub fn utilization(&self) -> f64 {
        if self.block_count == 0 {
            return 0.0;
        }
        self.allocated_blocks as f64 / self.block_count as f64
    }
}
