//! # nebula-blockpool
//!
//! Fixed-size block pool allocator for the Nebula workflow automation ecosystem.
//!
//! A pool reserves one contiguous arena up front, carves it into equally
//! sized blocks and hands them out / takes them back in O(1) through an
//! intrusive free list, never touching the general-purpose allocator on the
//! hot path.
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_blockpool::prelude::*;
//!
//! let mut pool = BlockPool::new(12, 10)?;
//! let handle = pool.allocate()?;
//! pool.block_mut(handle)?[..4].copy_from_slice(&7i32.to_ne_bytes());
//! pool.deallocate(handle)?;
//! # Ok::<(), PoolError>(())
//! ```
//!
//! ## Strategies
//!
//! - [`BlockPool`]: single-owner core, `&mut self` operations, generation-tagged handles
//! - [`SyncBlockPool`]: the core behind a `parking_lot` mutex
//! - [`AtomicBlockPool`]: lock-free free list, blocks handed out as RAII guards
//!
//! ## Features
//!
//! - `logging` (default): structured logging of pool lifecycle and failures via `tracing`

#![cfg_attr(docsrs, feature(doc_cfg))]
// The crate owns raw arena memory; every unsafe block carries a SAFETY note.
#![allow(unsafe_code)]
#![warn(rust_2018_idioms)]

// Error types
pub mod error;

// Core modules
pub mod arena;
pub mod config;
pub mod handle;
pub mod pool;
pub mod stats;
pub mod store;
pub mod utils;

// Concurrency strategies
pub mod lockfree;
pub mod sync;

pub use crate::arena::Arena;
pub use crate::config::{Hardening, PoolConfig};
pub use crate::error::{PoolError, PoolResult, Result};
pub use crate::handle::BlockHandle;
pub use crate::lockfree::{AtomicBlockPool, PooledBlock};
pub use crate::pool::{BlockPool, LINK_SIZE};
pub use crate::stats::PoolStats;
pub use crate::store::{BackingStore, SystemStore};
pub use crate::sync::SyncBlockPool;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::{Hardening, PoolConfig};
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::handle::BlockHandle;
    pub use crate::lockfree::{AtomicBlockPool, PooledBlock};
    pub use crate::pool::BlockPool;
    pub use crate::stats::PoolStats;
    pub use crate::store::{BackingStore, SystemStore};
    pub use crate::sync::SyncBlockPool;
}
