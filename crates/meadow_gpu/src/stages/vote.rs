//! # Stage 1: Vote
//!
//! Visibility predicate per candidate
//!
//! WGSL binding contract:
//!
//! ```text
//! @group(0) @binding(0) var<uniform>             params     : CullParams;
//! @group(0) @binding(1) var<storage, read>       candidates : array<Instance>;
//! @group(0) @binding(2) var<storage, read_write> votes      : array<u32>;
//! ```

use meadow_core::DispatchLayout;

use super::{storage_entry, uniform_entry, Kernel};

/// Buffers read and written by the vote stage.
#[derive(Debug, Clone, Copy)]
pub struct VoteBindings<'a> {
    /// Per-frame uniform.
    pub params: &'a wgpu::Buffer,
    /// Candidate instances (N).
    pub candidates: &'a wgpu::Buffer,
    /// Output flags (N).
    pub votes: &'a wgpu::Buffer,
}

/// Writes 1 or 0 per candidate.
#[derive(Debug)]
pub struct VoteStage {
    kernel: Kernel,
}

impl VoteStage {
    /// Compiles the stage.
    #[must_use]
    pub fn new(device: &wgpu::Device, source: &str) -> Self {
        let entries = [
            uniform_entry(0),
            storage_entry(1, true),  // candidates (read)
            storage_entry(2, false), // votes (write)
        ];
        Self {
            kernel: Kernel::new(device, "meadow_vote", source, &entries),
        }
    }

    /// Builds the bind group; done once per allocation.
    #[must_use]
    pub fn bind(&self, device: &wgpu::Device, bindings: &VoteBindings<'_>) -> wgpu::BindGroup {
        self.kernel
            .bind(device, &[bindings.params, bindings.candidates, bindings.votes])
    }

    /// Records the stage: `num_blocks` workgroups of `block_size` threads.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, layout: &DispatchLayout) {
        self.kernel.dispatch(encoder, bind_group, layout.num_blocks());
    }
}
