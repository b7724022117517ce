//! # Dispatch Layout
//!
//! Thread-group sizing for the vote → local scan → group scan → compact chain.
//!
//! The instance array is cut into blocks of `block_size` elements. Each block
//! is scanned locally, then the per-block totals are scanned by a single
//! workgroup of `group_capacity` slots. That second tier only works while the
//! block count fits in one pass, so the layout is validated here, once per
//! (re)allocation, and rejected if it would need a third tier.

use crate::error::{CullError, CullResult};

/// Default per-block capacity (threads per vote/compact workgroup).
pub const DEFAULT_BLOCK_SIZE: u32 = 128;

/// Default single-pass group-scan capacity.
pub const DEFAULT_GROUP_CAPACITY: u32 = 1024;

/// Sizing of every buffer and dispatch for one instance count.
///
/// Pure function of `(instance_count, block_size, group_capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLayout {
    instance_count: u32,
    block_size: u32,
    group_capacity: u32,
    num_blocks: u32,
    padded_blocks: u32,
}

impl DispatchLayout {
    /// Computes the layout for `instance_count` instances.
    ///
    /// # Errors
    ///
    /// - [`CullError::InvalidBlockSize`] / [`CullError::InvalidGroupCapacity`]
    ///   if either constant is not a power of two >= 2.
    /// - [`CullError::CapacityOverflow`] if the block count needs more than
    ///   one group-scan pass.
    pub fn new(instance_count: u32, block_size: u32, group_capacity: u32) -> CullResult<Self> {
        if block_size < 2 || !block_size.is_power_of_two() {
            return Err(CullError::InvalidBlockSize(block_size));
        }
        if group_capacity < 2 || !group_capacity.is_power_of_two() {
            return Err(CullError::InvalidGroupCapacity(group_capacity));
        }

        let num_blocks = instance_count.div_ceil(block_size);
        let padded_blocks = padded_block_count(num_blocks, group_capacity);

        if padded_blocks > group_capacity {
            tracing::warn!(
                instance_count,
                num_blocks,
                padded_blocks,
                group_capacity,
                "block count exceeds single-pass group scan"
            );
            return Err(CullError::CapacityOverflow {
                num_blocks,
                padded_blocks,
                capacity: group_capacity,
            });
        }

        Ok(Self {
            instance_count,
            block_size,
            group_capacity,
            num_blocks,
            padded_blocks,
        })
    }

    /// Computes the layout with the default constants.
    ///
    /// # Errors
    ///
    /// See [`DispatchLayout::new`].
    pub fn with_defaults(instance_count: u32) -> CullResult<Self> {
        Self::new(instance_count, DEFAULT_BLOCK_SIZE, DEFAULT_GROUP_CAPACITY)
    }

    /// Number of candidate instances (N).
    #[must_use]
    pub const fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Per-block capacity (B).
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Single-pass group-scan capacity.
    #[must_use]
    pub const fn group_capacity(&self) -> u32 {
        self.group_capacity
    }

    /// `ceil(N / B)`: workgroups dispatched for vote, local scan and compact.
    #[must_use]
    pub const fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    /// Length of the group-sum buffers after rounding.
    #[must_use]
    pub const fn padded_blocks(&self) -> u32 {
        self.padded_blocks
    }

    /// True when there is nothing to dispatch.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.instance_count == 0
    }

    /// Largest instance count these constants can serve in one pass.
    #[must_use]
    pub const fn max_instances(&self) -> u64 {
        self.block_size as u64 * self.group_capacity as u64
    }

    /// Block that owns instance `index`.
    #[inline]
    #[must_use]
    pub const fn block_of(&self, index: u32) -> u32 {
        index / self.block_size
    }

    /// Index range `[start, end)` covered by `block`, clipped to N.
    #[must_use]
    pub fn block_range(&self, block: u32) -> std::ops::Range<u32> {
        let start = (block * self.block_size).min(self.instance_count);
        let end = (start + self.block_size).min(self.instance_count);
        start..end
    }

    /// Threads used by a work-efficient scan over `size` slots.
    ///
    /// Each thread handles two slots per level; when that would exceed the
    /// device limit the kernel strides instead.
    #[must_use]
    pub fn scan_threads(size: u32, max_invocations: u32) -> u32 {
        (size / 2).clamp(1, max_invocations.max(1))
    }
}

/// Rounds a block count so the group-scan stage can consume it.
///
/// - `0` stays `0`.
/// - Within capacity: next power of two, which always divides the
///   (power-of-two) capacity.
/// - Beyond capacity: next power-of-two multiple of the capacity.
#[must_use]
pub fn padded_block_count(num_blocks: u32, group_capacity: u32) -> u32 {
    if num_blocks == 0 {
        return 0;
    }
    if num_blocks <= group_capacity {
        return num_blocks.next_power_of_two();
    }
    let passes = num_blocks.div_ceil(group_capacity).next_power_of_two();
    group_capacity.saturating_mul(passes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_block() {
        let layout = DispatchLayout::new(128, 128, 1024).unwrap();
        assert_eq!(layout.num_blocks(), 1);
        assert_eq!(layout.padded_blocks(), 1);
    }

    #[test]
    fn test_partial_last_block() {
        let layout = DispatchLayout::new(129, 128, 1024).unwrap();
        assert_eq!(layout.num_blocks(), 2);
        assert_eq!(layout.block_range(1), 128..129);
    }

    #[test]
    fn test_padding_within_capacity() {
        assert_eq!(padded_block_count(3, 1024), 4);
        assert_eq!(padded_block_count(513, 1024), 1024);
        assert_eq!(padded_block_count(1024, 1024), 1024);
    }

    #[test]
    fn test_padding_beyond_capacity() {
        assert_eq!(padded_block_count(1025, 1024), 2048);
        assert_eq!(padded_block_count(3 * 1024, 1024), 4096);
    }

    #[test]
    fn test_overflow_rejected() {
        let err = DispatchLayout::new(128 * 1024 + 1, 128, 1024).unwrap_err();
        assert_eq!(
            err,
            CullError::CapacityOverflow {
                num_blocks: 1025,
                padded_blocks: 2048,
                capacity: 1024,
            }
        );
    }

    #[test]
    fn test_max_instances_accepted() {
        let layout = DispatchLayout::new(128 * 1024, 128, 1024).unwrap();
        assert_eq!(layout.num_blocks(), 1024);
        assert_eq!(u64::from(layout.instance_count()), layout.max_instances());
    }

    #[test]
    fn test_empty_layout() {
        let layout = DispatchLayout::with_defaults(0).unwrap();
        assert!(layout.is_empty());
        assert_eq!(layout.num_blocks(), 0);
        assert_eq!(layout.padded_blocks(), 0);
    }

    #[test]
    fn test_invalid_constants() {
        assert_eq!(DispatchLayout::new(10, 100, 1024), Err(CullError::InvalidBlockSize(100)));
        assert_eq!(DispatchLayout::new(10, 1, 1024), Err(CullError::InvalidBlockSize(1)));
        assert_eq!(DispatchLayout::new(10, 128, 0), Err(CullError::InvalidGroupCapacity(0)));
    }

    #[test]
    fn test_scan_threads() {
        assert_eq!(DispatchLayout::scan_threads(128, 256), 64);
        assert_eq!(DispatchLayout::scan_threads(1024, 256), 256);
        assert_eq!(DispatchLayout::scan_threads(2, 256), 1);
    }
}
