//! # Indirect Args Writer
//!
//! Device-side copy of VisibleCount into the draw record's instance_count.
//! Recorded after the compact pass in the same encoder, so the draw that
//! consumes the record never waits on the host.

use meadow_core::DrawIndexedIndirectArgs;

/// Patches the indirect draw record from the visible counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndirectArgsWriter;

impl IndirectArgsWriter {
    /// Resets the visible counter; recorded before the vote pass.
    pub fn reset(encoder: &mut wgpu::CommandEncoder, visible_count: &wgpu::Buffer) {
        encoder.clear_buffer(visible_count, 0, None);
    }

    /// Copies the 4-byte counter into `instance_count`.
    pub fn encode(encoder: &mut wgpu::CommandEncoder, visible_count: &wgpu::Buffer, args: &wgpu::Buffer) {
        encoder.copy_buffer_to_buffer(
            visible_count,
            0,
            args,
            DrawIndexedIndirectArgs::INSTANCE_COUNT_OFFSET,
            std::mem::size_of::<u32>() as u64,
        );
    }
}
