//! # Stage 2: Local Scan
//!
//! Block-local exclusive scan of the votes
//!
//! WGSL binding contract:
//!
//! ```text
//! @group(0) @binding(0) var<uniform>             params     : CullParams;
//! @group(0) @binding(1) var<storage, read>       votes      : array<u32>;
//! @group(0) @binding(2) var<storage, read_write> scan       : array<u32>;
//! @group(0) @binding(3) var<storage, read_write> group_sums : array<u32>;
//! ```

use meadow_core::DispatchLayout;

use super::{storage_entry, uniform_entry, Kernel};

/// Buffers read and written by the local scan stage.
#[derive(Debug, Clone, Copy)]
pub struct LocalScanBindings<'a> {
    /// Per-frame uniform.
    pub params: &'a wgpu::Buffer,
    /// Vote flags (N).
    pub votes: &'a wgpu::Buffer,
    /// Block-local offsets (N).
    pub scan: &'a wgpu::Buffer,
    /// Per-block totals (padded blocks).
    pub group_sums: &'a wgpu::Buffer,
}

/// Scans each block in workgroup memory and emits its total.
#[derive(Debug)]
pub struct LocalScanStage {
    kernel: Kernel,
}

impl LocalScanStage {
    /// Compiles the stage.
    #[must_use]
    pub fn new(device: &wgpu::Device, source: &str) -> Self {
        let entries = [
            uniform_entry(0),
            storage_entry(1, true),  // votes (read)
            storage_entry(2, false), // scan (write)
            storage_entry(3, false), // group_sums (write)
        ];
        Self {
            kernel: Kernel::new(device, "meadow_local_scan", source, &entries),
        }
    }

    /// Builds the bind group; done once per allocation.
    #[must_use]
    pub fn bind(&self, device: &wgpu::Device, bindings: &LocalScanBindings<'_>) -> wgpu::BindGroup {
        self.kernel.bind(
            device,
            &[bindings.params, bindings.votes, bindings.scan, bindings.group_sums],
        )
    }

    /// Records the stage: one workgroup per block.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, layout: &DispatchLayout) {
        self.kernel.dispatch(encoder, bind_group, layout.num_blocks());
    }
}
