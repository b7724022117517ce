//! # Reference Executor
//!
//! Host evaluation of vote → local scan → group scan → compact, block by
//! block, with the same arithmetic as the WGSL kernels: blocks padded to
//! `block_size` with zero votes, the work-efficient up-sweep/down-sweep, and
//! a single group-scan pass over `group_capacity` slots.
//!
//! Used by tests, benches and diagnostics to check device output. Never on
//! the frame path.

use crate::error::{CullError, CullResult};
use crate::frustum::{CullParams, FrameParams};
use crate::instance::CullInstance;
use crate::layout::DispatchLayout;

/// Every intermediate buffer of one culling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOutput<T> {
    /// One flag per candidate.
    pub votes: Vec<u32>,
    /// Block-local exclusive prefix sums, one per candidate.
    pub scan: Vec<u32>,
    /// Per-block totals, `padded_blocks` long (zero past `num_blocks`).
    pub group_sums: Vec<u32>,
    /// Exclusive prefix sum of `group_sums`, `padded_blocks` long.
    pub scanned_group_sums: Vec<u32>,
    /// Accepted candidates in ascending source order.
    pub compacted: Vec<T>,
    /// Number of accepted candidates.
    pub visible_count: u32,
}

/// Runs the four stages on the host for one layout.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceExecutor {
    layout: DispatchLayout,
}

impl ReferenceExecutor {
    /// Creates an executor for a layout.
    #[must_use]
    pub const fn new(layout: DispatchLayout) -> Self {
        Self { layout }
    }

    /// The layout this executor was built for.
    #[must_use]
    pub const fn layout(&self) -> &DispatchLayout {
        &self.layout
    }

    /// Full pass: votes from the predicate, then scan and compact.
    ///
    /// # Errors
    ///
    /// [`CullError::CandidateCountMismatch`] if `candidates` is not N long.
    pub fn run<T: CullInstance>(&self, candidates: &[T], frame: &FrameParams) -> CullResult<ReferenceOutput<T>> {
        self.check_len(candidates.len())?;
        let votes = vote(candidates, &frame.to_uniform(&self.layout));
        self.run_with_votes(candidates, votes)
    }

    /// Scan and compact a given vote pattern.
    ///
    /// # Errors
    ///
    /// [`CullError::CandidateCountMismatch`] if `candidates` or `votes` is
    /// not N long.
    pub fn run_with_votes<T: CullInstance>(&self, candidates: &[T], votes: Vec<u32>) -> CullResult<ReferenceOutput<T>> {
        self.check_len(candidates.len())?;
        self.check_len(votes.len())?;

        let (scan, group_sums) = local_scan(&self.layout, &votes);
        let scanned_group_sums = group_scan(&self.layout, &group_sums);
        let compacted = compact(&self.layout, candidates, &votes, &scan, &scanned_group_sums);
        let visible_count = compacted.len() as u32;

        Ok(ReferenceOutput {
            votes,
            scan,
            group_sums,
            scanned_group_sums,
            compacted,
            visible_count,
        })
    }

    fn check_len(&self, actual: usize) -> CullResult<()> {
        let expected = self.layout.instance_count();
        if actual == expected as usize {
            Ok(())
        } else {
            Err(CullError::CandidateCountMismatch { expected, actual })
        }
    }
}

/// Evaluates the visibility predicate for every candidate.
#[must_use]
pub fn vote<T: CullInstance>(candidates: &[T], params: &CullParams) -> Vec<u32> {
    candidates
        .iter()
        .map(|c| {
            let (center, radius) = c.bounding_sphere();
            u32::from(params.is_visible(center, radius))
        })
        .collect()
}

/// Block-local exclusive scan plus per-block totals.
///
/// Returns `(scan, group_sums)`; `group_sums` is `padded_blocks` long.
#[must_use]
pub fn local_scan(layout: &DispatchLayout, votes: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let block_size = layout.block_size() as usize;
    let mut scan = vec![0u32; votes.len()];
    let mut group_sums = vec![0u32; layout.padded_blocks() as usize];
    let mut shared = vec![0u32; block_size];

    for block in 0..layout.num_blocks() {
        let range = layout.block_range(block);
        let (start, end) = (range.start as usize, range.end as usize);

        shared.fill(0);
        shared[..end - start].copy_from_slice(&votes[start..end]);
        group_sums[block as usize] = work_efficient_scan(&mut shared);
        scan[start..end].copy_from_slice(&shared[..end - start]);
    }

    (scan, group_sums)
}

/// Single-pass exclusive scan of the block totals.
///
/// Only the first `num_blocks` totals are read; the rest of the
/// `group_capacity` slots are zero.
#[must_use]
pub fn group_scan(layout: &DispatchLayout, group_sums: &[u32]) -> Vec<u32> {
    let padded = layout.padded_blocks() as usize;
    if padded == 0 {
        return Vec::new();
    }

    let live = (layout.num_blocks() as usize).min(group_sums.len());
    let mut shared = vec![0u32; layout.group_capacity() as usize];
    shared[..live].copy_from_slice(&group_sums[..live]);
    work_efficient_scan(&mut shared);
    shared.truncate(padded);
    shared
}

/// Writes every voted candidate to `scanned[block] + scan[i]`.
#[must_use]
pub fn compact<T: CullInstance>(
    layout: &DispatchLayout,
    candidates: &[T],
    votes: &[u32],
    scan: &[u32],
    scanned_group_sums: &[u32],
) -> Vec<T> {
    let total: u32 = votes.iter().sum();
    let mut out = vec![T::zeroed(); total as usize];

    for (i, candidate) in candidates.iter().enumerate() {
        if votes[i] == 0 {
            continue;
        }
        let block = layout.block_of(i as u32) as usize;
        let slot = (scanned_group_sums[block] + scan[i]) as usize;
        out[slot] = *candidate;
    }

    out
}

/// In-place work-efficient exclusive scan; returns the total.
///
/// `data.len()` must be a power of two. Same level structure as the WGSL
/// up-sweep/down-sweep.
pub fn work_efficient_scan(data: &mut [u32]) -> u32 {
    let n = data.len();
    if n == 0 {
        return 0;
    }
    debug_assert!(n.is_power_of_two(), "scan width {n} is not a power of two");

    // Up-sweep
    let mut offset = 1;
    let mut d = n >> 1;
    while d > 0 {
        for t in 0..d {
            let ai = offset * (2 * t + 1) - 1;
            let bi = offset * (2 * t + 2) - 1;
            data[bi] += data[ai];
        }
        offset <<= 1;
        d >>= 1;
    }

    let total = data[n - 1];
    data[n - 1] = 0;

    // Down-sweep
    let mut d = 1;
    while d < n {
        offset >>= 1;
        for t in 0..d {
            let ai = offset * (2 * t + 1) - 1;
            let bi = offset * (2 * t + 2) - 1;
            let left = data[ai];
            data[ai] = data[bi];
            data[bi] += left;
        }
        d <<= 1;
    }

    total
}
