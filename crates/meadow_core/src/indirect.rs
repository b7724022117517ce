//! Indirect draw argument record.

use bytemuck::{Pod, Zeroable};

/// DrawIndexedIndirect arguments consumed by the renderer.
///
/// Layout matches `wgpu::util::DrawIndexedIndirectArgs` and the D3D/Vulkan
/// indexed-indirect command. `instance_count` is written on the device every
/// frame from the visible count; the host only sets the other four fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices per instance.
    pub index_count: u32,
    /// Number of instances to draw (filled by the device).
    pub instance_count: u32,
    /// First index in the index buffer.
    pub first_index: u32,
    /// Vertex offset added to each index.
    pub base_vertex: i32,
    /// First instance ID.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Byte offset of `instance_count` inside the record.
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;

    /// Creates a template for a mesh, with no instances.
    #[must_use]
    pub const fn for_mesh(index_count: u32, first_index: u32, base_vertex: i32) -> Self {
        Self {
            index_count,
            instance_count: 0,
            first_index,
            base_vertex,
            first_instance: 0,
        }
    }

    /// Creates a template for a camera-facing quad (2 triangles).
    #[must_use]
    pub const fn for_quads() -> Self {
        Self::for_mesh(6, 0, 0)
    }
}
