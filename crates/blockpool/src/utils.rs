//! Small helpers shared by the pool strategies

/// Largest alignment the arena is ever given
pub const MAX_NATURAL_ALIGN: usize = 64;

/// Natural alignment of a block size: the largest power of two dividing it,
/// capped at [`MAX_NATURAL_ALIGN`] and never below the free-list link's own
/// alignment.
///
/// # Examples
/// ```
/// use nebula_blockpool::utils::natural_align;
///
/// assert_eq!(natural_align(12), 8);
/// assert_eq!(natural_align(32), 32);
/// assert_eq!(natural_align(4096), 64);
/// ```
#[inline]
pub const fn natural_align(block_size: usize) -> usize {
    let link_align = align_of::<usize>();
    if block_size == 0 {
        return link_align;
    }
    let mut align = 1usize << block_size.trailing_zeros();
    if align > MAX_NATURAL_ALIGN {
        align = MAX_NATURAL_ALIGN;
    }
    if align < link_align { link_align } else { align }
}

/// Backoff utility for spin loops
#[derive(Debug, Clone)]
pub struct Backoff {
    current: u32,
    max: u32,
}

impl Backoff {
    /// Create new backoff with default parameters
    #[inline]
    pub fn new() -> Self {
        Self {
            current: 1,
            max: 64,
        }
    }

    /// Perform backoff
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..self.current {
            core::hint::spin_loop();
        }
        if self.current < self.max {
            self.current *= 2;
        }
    }

    /// Spin while contention is short, yield to the scheduler once it isn't
    #[inline]
    pub fn spin_or_yield(&mut self) {
        if self.current < self.max {
            self.spin();
        } else {
            std::thread::yield_now();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_align() {
        let word = align_of::<usize>();
        assert_eq!(natural_align(0), word);
        assert_eq!(natural_align(3), word);
        assert_eq!(natural_align(24), 8usize.max(word));
        assert_eq!(natural_align(48), 16);
        assert_eq!(natural_align(1 << 20), MAX_NATURAL_ALIGN);
    }

    #[test]
    fn test_backoff_saturates() {
        let mut backoff = Backoff::new();
        for _ in 0..10 {
            backoff.spin();
        }
        assert_eq!(backoff.current, backoff.max);
    }

    #[test]
    fn test_backoff_yields_once_saturated() {
        let mut backoff = Backoff::new();
        for _ in 0..20 {
            backoff.spin_or_yield();
        }
        assert_eq!(backoff.current, 64);
    }
}
