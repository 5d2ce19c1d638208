//! Standalone error types for nebula-blockpool
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use core::alloc::Layout;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Type
// ============================================================================

/// Block pool errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Construction Errors ---
    #[error("Invalid pool configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Backing store could not supply arena: {size} bytes with {align} byte alignment")]
    OutOfMemory { size: usize, align: usize },

    // --- Steady-state Errors ---
    #[error("Block pool exhausted (capacity: {capacity} blocks)")]
    Exhausted { capacity: usize },

    // --- Handle Errors ---
    #[error("Invalid block handle: {reason}")]
    InvalidHandle { reason: String },

    #[error("Double free of block {index}")]
    DoubleFree { index: usize },

    #[error(
        "Use after free of block {index}: handle generation {handle_generation}, slot generation {slot_generation}"
    )]
    UseAfterFree {
        index: usize,
        handle_generation: u32,
        slot_generation: u32,
    },

    // --- Integrity Errors ---
    #[error("Free list corruption detected: {details}")]
    Corruption { details: String },
}

impl PoolError {
    /// Check if error is retryable
    ///
    /// Only exhaustion is expected to clear up on its own once blocks are
    /// returned; everything else needs the caller to change what it does.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "POOL:CONFIG:INVALID",
            Self::OutOfMemory { .. } => "POOL:ARENA:OOM",
            Self::Exhausted { .. } => "POOL:EXHAUSTED",
            Self::InvalidHandle { .. } => "POOL:HANDLE:INVALID",
            Self::DoubleFree { .. } => "POOL:HANDLE:DOUBLE_FREE",
            Self::UseAfterFree { .. } => "POOL:HANDLE:USE_AFTER_FREE",
            Self::Corruption { .. } => "POOL:CORRUPTION",
        }
    }

    /// Check if this error reports misuse of a block handle
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHandle { .. } | Self::DoubleFree { .. } | Self::UseAfterFree { .. }
        )
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        let reason = reason.into();

        #[cfg(feature = "logging")]
        warn!("Invalid pool configuration: {reason}");

        Self::InvalidConfiguration { reason }
    }

    /// Create out of memory error
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "Backing store refused block pool arena");

        Self::OutOfMemory { size, align }
    }

    /// Create out of memory error from layout
    pub fn out_of_memory_with_layout(layout: Layout) -> Self {
        Self::out_of_memory(layout.size(), layout.align())
    }

    /// Create exhausted error
    pub fn exhausted(capacity: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(capacity, "Block pool exhausted");

        Self::Exhausted { capacity }
    }

    /// Create invalid handle error
    pub fn invalid_handle(reason: impl Into<String>) -> Self {
        let reason = reason.into();

        #[cfg(feature = "logging")]
        error!("Invalid block handle: {reason}");

        Self::InvalidHandle { reason }
    }

    /// Create double free error
    pub fn double_free(index: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(index, "Double free detected");

        Self::DoubleFree { index }
    }

    /// Create use after free error
    pub fn use_after_free(index: usize, handle_generation: u32, slot_generation: u32) -> Self {
        #[cfg(feature = "logging")]
        error!(
            index,
            handle_generation, slot_generation, "Stale block handle used"
        );

        Self::UseAfterFree {
            index,
            handle_generation,
            slot_generation,
        }
    }

    /// Create free list corruption error
    pub fn corruption(details: impl Into<String>) -> Self {
        let details = details.into();

        #[cfg(feature = "logging")]
        error!("Free list corruption: {details}");

        Self::Corruption { details }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for block pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

/// Generic result type alias
pub type Result<T> = PoolResult<T>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = PoolError::out_of_memory(1024, 8);
        assert!(error.to_string().contains("1024"));

        let error = PoolError::exhausted(10);
        assert!(error.to_string().contains("10 blocks"));

        let error = PoolError::use_after_free(3, 1, 2);
        let message = error.to_string();
        assert!(message.contains("block 3"));
        assert!(message.contains("generation 1"));
    }

    #[test]
    fn test_error_with_layout() {
        let layout = Layout::new::<u64>();
        let error = PoolError::out_of_memory_with_layout(layout);
        assert_eq!(
            error,
            PoolError::OutOfMemory {
                size: layout.size(),
                align: layout.align()
            }
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PoolError::invalid_config("x").code(), "POOL:CONFIG:INVALID");
        assert_eq!(PoolError::exhausted(1).code(), "POOL:EXHAUSTED");
        assert_eq!(PoolError::double_free(0).code(), "POOL:HANDLE:DOUBLE_FREE");
        assert_eq!(PoolError::corruption("cycle").code(), "POOL:CORRUPTION");
    }

    #[test]
    fn test_retryable() {
        assert!(PoolError::exhausted(100).is_retryable());
        assert!(!PoolError::invalid_config("zero blocks").is_retryable());
        assert!(!PoolError::out_of_memory(64, 8).is_retryable());
        assert!(!PoolError::double_free(1).is_retryable());
    }

    #[test]
    fn test_handle_errors() {
        assert!(PoolError::invalid_handle("foreign pool").is_handle_error());
        assert!(PoolError::use_after_free(0, 0, 1).is_handle_error());
        assert!(!PoolError::exhausted(1).is_handle_error());
    }
}
