//! # Buffer Lifecycle
//!
//! Every buffer the pipeline owns, sized from one DispatchLayout. Reallocated
//! only when the instance count changes.

use meadow_core::{CullParams, DispatchLayout, DrawIndexedIndirectArgs};
use wgpu::util::DeviceExt;

/// Usage of every stage buffer: compute storage plus diagnostics copies.
pub const STORAGE_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

/// Usage of the compacted buffer, which the renderer binds as its
/// per-instance vertex buffer.
pub const COMPACTED_USAGE: wgpu::BufferUsages = STORAGE_USAGE.union(wgpu::BufferUsages::VERTEX);

fn new_buffer(device: &wgpu::Device, label: &str, size_bytes: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size_bytes,
        usage,
        mapped_at_creation: false,
    })
}

fn new_storage(device: &wgpu::Device, label: &str, size_bytes: u64) -> wgpu::Buffer {
    new_buffer(device, label, size_bytes, STORAGE_USAGE)
}

/// Bytes for `len` elements of `stride`, never zero.
///
/// Storage bindings cannot be empty, so an empty layout still gets one
/// element that no dispatch ever touches.
#[must_use]
pub fn element_bytes(len: u32, stride: usize) -> u64 {
    u64::from(len.max(1)) * stride as u64
}

/// All device buffers of one allocation.
#[derive(Debug)]
pub struct CullBuffers {
    /// Candidate instances (N).
    pub candidates: wgpu::Buffer,
    /// Vote flags (N).
    pub votes: wgpu::Buffer,
    /// Block-local offsets (N).
    pub scan: wgpu::Buffer,
    /// Per-block totals (padded blocks).
    pub group_sums: wgpu::Buffer,
    /// Per-block base offsets (padded blocks).
    pub scanned_group_sums: wgpu::Buffer,
    /// Accepted instances (capacity N).
    pub compacted: wgpu::Buffer,
    /// Single atomic counter.
    pub visible_count: wgpu::Buffer,
    /// Per-frame uniform.
    pub params: wgpu::Buffer,
    /// Indirect draw record.
    pub args: wgpu::Buffer,
}

impl CullBuffers {
    /// Allocates every buffer for `layout` with instances of `stride` bytes.
    #[must_use]
    pub fn allocate(
        device: &wgpu::Device,
        layout: &DispatchLayout,
        stride: usize,
        args_template: &DrawIndexedIndirectArgs,
    ) -> Self {
        let n = layout.instance_count();
        let padded = layout.padded_blocks();
        let word = std::mem::size_of::<u32>();

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("meadow_params"),
            size: CullParams::SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let template = DrawIndexedIndirectArgs {
            instance_count: 0,
            ..*args_template
        };
        let args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("meadow_indirect_args"),
            contents: bytemuck::bytes_of(&template),
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        });

        tracing::info!(
            instances = n,
            blocks = layout.num_blocks(),
            padded_blocks = padded,
            stride,
            "allocated culling buffers"
        );

        Self {
            candidates: new_storage(device, "meadow_candidates", element_bytes(n, stride)),
            votes: new_storage(device, "meadow_votes", element_bytes(n, word)),
            scan: new_storage(device, "meadow_scan", element_bytes(n, word)),
            group_sums: new_storage(device, "meadow_group_sums", element_bytes(padded, word)),
            scanned_group_sums: new_storage(device, "meadow_scanned_group_sums", element_bytes(padded, word)),
            compacted: new_buffer(device, "meadow_compacted", element_bytes(n, stride), COMPACTED_USAGE),
            visible_count: new_storage(device, "meadow_visible_count", word as u64),
            params,
            args,
        }
    }
}
