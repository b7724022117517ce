//! # Stage 3: Group Scan
//!
//! Exclusive scan of the block totals, single workgroup
//!
//! Only correct while num_blocks <= group capacity; DispatchLayout refuses
//! anything larger, so there is no third tier to fall back on.
//!
//! WGSL binding contract:
//!
//! ```text
//! @group(0) @binding(0) var<uniform>             params             : CullParams;
//! @group(0) @binding(1) var<storage, read>       group_sums         : array<u32>;
//! @group(0) @binding(2) var<storage, read_write> scanned_group_sums : array<u32>;
//! ```

use meadow_core::DispatchLayout;

use super::{storage_entry, uniform_entry, Kernel};

/// Buffers read and written by the group scan stage.
#[derive(Debug, Clone, Copy)]
pub struct GroupScanBindings<'a> {
    /// Per-frame uniform.
    pub params: &'a wgpu::Buffer,
    /// Per-block totals.
    pub group_sums: &'a wgpu::Buffer,
    /// Per-block base offsets.
    pub scanned_group_sums: &'a wgpu::Buffer,
}

/// Turns block totals into block base offsets.
#[derive(Debug)]
pub struct GroupScanStage {
    kernel: Kernel,
}

impl GroupScanStage {
    /// Compiles the stage.
    #[must_use]
    pub fn new(device: &wgpu::Device, source: &str) -> Self {
        let entries = [
            uniform_entry(0),
            storage_entry(1, true),  // group_sums (read)
            storage_entry(2, false), // scanned_group_sums (write)
        ];
        Self {
            kernel: Kernel::new(device, "meadow_group_scan", source, &entries),
        }
    }

    /// Builds the bind group; done once per allocation.
    #[must_use]
    pub fn bind(&self, device: &wgpu::Device, bindings: &GroupScanBindings<'_>) -> wgpu::BindGroup {
        self.kernel.bind(
            device,
            &[bindings.params, bindings.group_sums, bindings.scanned_group_sums],
        )
    }

    /// Records the stage: exactly one workgroup.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, layout: &DispatchLayout) {
        debug_assert!(layout.padded_blocks() <= layout.group_capacity());
        self.kernel.dispatch(encoder, bind_group, 1);
    }
}
