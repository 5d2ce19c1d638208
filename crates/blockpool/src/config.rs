//! Block pool configuration

/// How much bookkeeping the pool consults when a handle comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hardening {
    /// Only range and pool identity are checked. Freeing a block twice
    /// links it into the free list twice; the pool stays memory-safe but
    /// may hand the block out to two callers.
    Unchecked,
    /// Per-slot state and generation are checked on every free and access,
    /// turning double frees and stale handles into errors.
    #[default]
    Checked,
}

impl Hardening {
    /// Returns true if slot state is consulted on free and access
    #[inline]
    pub fn is_checked(self) -> bool {
        matches!(self, Self::Checked)
    }
}

/// Configuration for block pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Double-free / use-after-free detection
    pub hardening: Hardening,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated blocks (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for freed blocks, past the free-list link (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            hardening: Hardening::Checked,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Production configuration - checked handles, no debug overhead
    #[must_use]
    pub fn production() -> Self {
        Self {
            hardening: Hardening::Checked,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            hardening: Hardening::Checked,
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - minimal overhead
    #[must_use]
    pub fn performance() -> Self {
        Self {
            hardening: Hardening::Unchecked,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Sets the hardening mode
    #[must_use = "builder methods must be chained or built"]
    pub fn with_hardening(mut self, hardening: Hardening) -> Self {
        self.hardening = hardening;
        self
    }

    /// Enables or disables statistics tracking
    #[must_use = "builder methods must be chained or built"]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = PoolConfig::production();
        assert!(production.hardening.is_checked());
        assert!(!production.track_stats);
        assert!(production.alloc_pattern.is_none());

        let debug = PoolConfig::debug();
        assert!(debug.track_stats);
        assert_eq!(debug.alloc_pattern, Some(0xBB));
        assert_eq!(debug.dealloc_pattern, Some(0xDD));

        let performance = PoolConfig::performance();
        assert_eq!(performance.hardening, Hardening::Unchecked);
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::production()
            .with_hardening(Hardening::Unchecked)
            .with_stats(true);
        assert!(!config.hardening.is_checked());
        assert!(config.track_stats);
    }

    #[test]
    fn test_default_is_checked() {
        assert_eq!(Hardening::default(), Hardening::Checked);
        assert!(PoolConfig::default().hardening.is_checked());
    }
}
