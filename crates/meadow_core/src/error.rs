//! # Culling Error Types
//!
//! All errors that can occur while configuring or sizing the culling pipeline.
//! Every one of them is raised at allocation time; a frame never fails.

use thiserror::Error;

/// Errors that can occur while configuring the culling pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CullError {
    /// The field configuration produced zero instances.
    #[error("field configuration yields zero instances (terrain size {terrain_size}, density {density})")]
    EmptyField {
        /// Terrain side length, truncated to whole units.
        terrain_size: u32,
        /// Requested density.
        density: u32,
    },

    /// Per-block capacity is not a power of two of at least 2.
    #[error("invalid block size {0}: must be a power of two >= 2")]
    InvalidBlockSize(u32),

    /// Group-scan capacity is not a power of two of at least 2.
    #[error("invalid group-scan capacity {0}: must be a power of two >= 2")]
    InvalidGroupCapacity(u32),

    /// The block count does not fit in a single group-scan pass.
    ///
    /// A third scan tier would be required; until one exists this is fatal.
    #[error(
        "group-scan capacity exceeded: {num_blocks} blocks (padded to {padded_blocks}) \
         but a single pass holds {capacity}"
    )]
    CapacityOverflow {
        /// Blocks required by the instance count.
        num_blocks: u32,
        /// Block count after the rounding policy.
        padded_blocks: u32,
        /// Single-pass group-scan capacity.
        capacity: u32,
    },

    /// Instance count does not fit in a `u32` index space.
    #[error("too many instances: requested {requested}, max {max}")]
    TooManyInstances {
        /// Requested instance count.
        requested: u64,
        /// Largest supported instance count.
        max: u64,
    },

    /// Candidate upload does not match the allocated instance count.
    #[error("candidate count mismatch: pipeline sized for {expected}, got {actual}")]
    CandidateCountMismatch {
        /// Allocated instance count.
        expected: u32,
        /// Length of the uploaded slice.
        actual: usize,
    },

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("config io: {0}")]
    Io(String),
}

/// Result type for culling configuration operations.
pub type CullResult<T> = Result<T, CullError>;
