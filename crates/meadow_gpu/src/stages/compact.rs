//! # Stage 4: Compact
//!
//! Stable scatter of accepted candidates + visible count
//!
//! WGSL binding contract:
//!
//! ```text
//! @group(0) @binding(0) var<uniform>             params             : CullParams;
//! @group(0) @binding(1) var<storage, read>       candidates         : array<Instance>;
//! @group(0) @binding(2) var<storage, read>       votes              : array<u32>;
//! @group(0) @binding(3) var<storage, read>       scan               : array<u32>;
//! @group(0) @binding(4) var<storage, read>       scanned_group_sums : array<u32>;
//! @group(0) @binding(5) var<storage, read_write> compacted          : array<Instance>;
//! @group(0) @binding(6) var<storage, read_write> visible_count      : atomic<u32>;
//! ```

use meadow_core::DispatchLayout;

use super::{storage_entry, uniform_entry, Kernel};

/// Storage buffers the compact stage binds; the device must allow this many.
pub const COMPACT_STORAGE_BINDINGS: u32 = 6;

/// Buffers read and written by the compact stage.
#[derive(Debug, Clone, Copy)]
pub struct CompactBindings<'a> {
    /// Per-frame uniform.
    pub params: &'a wgpu::Buffer,
    /// Candidate instances (N).
    pub candidates: &'a wgpu::Buffer,
    /// Vote flags (N).
    pub votes: &'a wgpu::Buffer,
    /// Block-local offsets (N).
    pub scan: &'a wgpu::Buffer,
    /// Per-block base offsets.
    pub scanned_group_sums: &'a wgpu::Buffer,
    /// Output instances (capacity N).
    pub compacted: &'a wgpu::Buffer,
    /// Atomic visible counter.
    pub visible_count: &'a wgpu::Buffer,
}

/// Writes each accepted candidate to `scanned[block] + scan[i]`.
#[derive(Debug)]
pub struct CompactStage {
    kernel: Kernel,
}

impl CompactStage {
    /// Compiles the stage.
    #[must_use]
    pub fn new(device: &wgpu::Device, source: &str) -> Self {
        let entries = [
            uniform_entry(0),
            storage_entry(1, true),  // candidates (read)
            storage_entry(2, true),  // votes (read)
            storage_entry(3, true),  // scan (read)
            storage_entry(4, true),  // scanned_group_sums (read)
            storage_entry(5, false), // compacted (write)
            storage_entry(6, false), // visible_count (atomic)
        ];
        Self {
            kernel: Kernel::new(device, "meadow_compact", source, &entries),
        }
    }

    /// Builds the bind group; done once per allocation.
    #[must_use]
    pub fn bind(&self, device: &wgpu::Device, bindings: &CompactBindings<'_>) -> wgpu::BindGroup {
        self.kernel.bind(
            device,
            &[
                bindings.params,
                bindings.candidates,
                bindings.votes,
                bindings.scan,
                bindings.scanned_group_sums,
                bindings.compacted,
                bindings.visible_count,
            ],
        )
    }

    /// Records the stage: `num_blocks` workgroups of `block_size` threads.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, layout: &DispatchLayout) {
        self.kernel.dispatch(encoder, bind_group, layout.num_blocks());
    }
}
