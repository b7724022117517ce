//! # Culling Pipeline
//!
//! Host-side driver for the four compute stages.
//!
//! ## Lifecycle
//!
//! ```text
//! new / resize   → layout check, device limits, buffers, bind groups
//! upload         → candidates written once per configuration
//! per frame      → params → clear count → vote → local scan → group scan
//!                  → compact → copy count into indirect args
//! ```
//!
//! Nothing in the per-frame path maps or reads a buffer. The renderer binds
//! [`CullPipeline::compacted_buffer`] as its instance buffer and issues
//! `draw_indexed_indirect` with [`CullPipeline::indirect_args_buffer`].

use std::marker::PhantomData;

use meadow_core::{CullError, CullInstance, DispatchLayout, DrawIndexedIndirectArgs, FrameParams, PipelineConfig};

use crate::buffers::CullBuffers;
use crate::error::{GpuError, GpuResult};
use crate::shaders::CullShaders;
use crate::stages::compact::COMPACT_STORAGE_BINDINGS;
use crate::stages::{
    CompactBindings, CompactStage, GroupScanBindings, GroupScanStage, IndirectArgsWriter, LocalScanBindings,
    LocalScanStage, VoteBindings, VoteStage,
};

/// Bind groups of one allocation, built once.
#[derive(Debug)]
struct StageBindGroups {
    vote: wgpu::BindGroup,
    local_scan: wgpu::BindGroup,
    group_scan: wgpu::BindGroup,
    compact: wgpu::BindGroup,
}

/// GPU-driven visibility culling for payload `T`.
#[derive(Debug)]
pub struct CullPipeline<T: CullInstance> {
    config: PipelineConfig,
    layout: DispatchLayout,
    vote: VoteStage,
    local_scan: LocalScanStage,
    group_scan: GroupScanStage,
    compact: CompactStage,
    buffers: CullBuffers,
    bind_groups: StageBindGroups,
    args_template: DrawIndexedIndirectArgs,
    _payload: PhantomData<T>,
}

impl<T: CullInstance> CullPipeline<T> {
    /// Compiles the stages and allocates buffers for `instance_count`.
    ///
    /// The indirect record starts as a camera-facing quad template; see
    /// [`CullPipeline::set_args_template`].
    ///
    /// # Errors
    ///
    /// - [`GpuError::Cull`] if the layout is invalid or needs a third scan tier.
    /// - [`GpuError::DeviceLimit`] if the device cannot run it.
    pub fn new(device: &wgpu::Device, config: &PipelineConfig, instance_count: u32) -> GpuResult<Self> {
        let layout = DispatchLayout::new(instance_count, config.block_size, config.group_capacity)?;
        let limits = device.limits();
        check_limits::<T>(&limits, &layout)?;

        let max_threads = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x);
        let shaders = CullShaders::compose::<T>(config.block_size, config.group_capacity, max_threads);

        let vote = VoteStage::new(device, &shaders.vote);
        let local_scan = LocalScanStage::new(device, &shaders.local_scan);
        let group_scan = GroupScanStage::new(device, &shaders.group_scan);
        let compact = CompactStage::new(device, &shaders.compact);

        let args_template = DrawIndexedIndirectArgs::for_quads();
        let buffers = CullBuffers::allocate(device, &layout, std::mem::size_of::<T>(), &args_template);
        let bind_groups = bind_stages(device, &buffers, &vote, &local_scan, &group_scan, &compact);

        tracing::info!(
            instances = layout.instance_count(),
            block_size = config.block_size,
            group_capacity = config.group_capacity,
            local_scan_threads = shaders.local_scan_threads,
            group_scan_threads = shaders.group_scan_threads,
            "culling pipeline ready"
        );

        Ok(Self {
            config: *config,
            layout,
            vote,
            local_scan,
            group_scan,
            compact,
            buffers,
            bind_groups,
            args_template,
            _payload: PhantomData,
        })
    }

    /// Reallocates for a new instance count.
    ///
    /// Returns `false` and keeps everything when the count is unchanged.
    /// Candidates must be uploaded again after a reallocation.
    ///
    /// # Errors
    ///
    /// As [`CullPipeline::new`]; on error the previous allocation is kept.
    pub fn resize(&mut self, device: &wgpu::Device, instance_count: u32) -> GpuResult<bool> {
        if instance_count == self.layout.instance_count() {
            return Ok(false);
        }

        let layout = DispatchLayout::new(instance_count, self.config.block_size, self.config.group_capacity)?;
        check_limits::<T>(&device.limits(), &layout)?;

        tracing::info!(
            from = self.layout.instance_count(),
            to = instance_count,
            "reallocating culling buffers"
        );

        self.buffers = CullBuffers::allocate(device, &layout, std::mem::size_of::<T>(), &self.args_template);
        self.bind_groups = bind_stages(
            device,
            &self.buffers,
            &self.vote,
            &self.local_scan,
            &self.group_scan,
            &self.compact,
        );
        self.layout = layout;
        Ok(true)
    }

    /// Writes the candidate buffer.
    ///
    /// # Errors
    ///
    /// [`CullError::CandidateCountMismatch`] if `candidates` is not N long.
    pub fn upload_candidates(&self, queue: &wgpu::Queue, candidates: &[T]) -> GpuResult<()> {
        let expected = self.layout.instance_count();
        if candidates.len() != expected as usize {
            return Err(CullError::CandidateCountMismatch {
                expected,
                actual: candidates.len(),
            }
            .into());
        }
        if !candidates.is_empty() {
            queue.write_buffer(&self.buffers.candidates, 0, bytemuck::cast_slice(candidates));
        }
        tracing::debug!(count = candidates.len(), "uploaded candidates");
        Ok(())
    }

    /// Replaces the indirect record template (`instance_count` is ignored).
    pub fn set_args_template(&mut self, queue: &wgpu::Queue, template: DrawIndexedIndirectArgs) {
        self.args_template = DrawIndexedIndirectArgs {
            instance_count: 0,
            ..template
        };
        queue.write_buffer(&self.buffers.args, 0, bytemuck::bytes_of(&self.args_template));
    }

    /// Writes this frame's camera parameters.
    pub fn prepare_frame(&self, queue: &wgpu::Queue, frame: &FrameParams) {
        let params = frame.to_uniform(&self.layout);
        queue.write_buffer(&self.buffers.params, 0, bytemuck::bytes_of(&params));
    }

    /// Records the culling pass.
    ///
    /// Each stage gets its own compute pass, which is a full barrier between
    /// stages. An empty layout records only the counter reset and the args
    /// patch, so the draw renders nothing.
    pub fn encode_frame(&self, encoder: &mut wgpu::CommandEncoder) {
        IndirectArgsWriter::reset(encoder, &self.buffers.visible_count);

        if !self.layout.is_empty() {
            self.vote.encode(encoder, &self.bind_groups.vote, &self.layout);
            self.local_scan
                .encode(encoder, &self.bind_groups.local_scan, &self.layout);
            self.group_scan
                .encode(encoder, &self.bind_groups.group_scan, &self.layout);
            self.compact.encode(encoder, &self.bind_groups.compact, &self.layout);
        }

        IndirectArgsWriter::encode(encoder, &self.buffers.visible_count, &self.buffers.args);
        tracing::trace!(blocks = self.layout.num_blocks(), "encoded culling pass");
    }

    /// Prepares, encodes and submits one frame on its own encoder.
    pub fn run_frame(&self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &FrameParams) -> wgpu::SubmissionIndex {
        self.prepare_frame(queue, frame);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("meadow_cull"),
        });
        self.encode_frame(&mut encoder);
        queue.submit(Some(encoder.finish()))
    }

    /// Current sizing.
    #[must_use]
    pub const fn layout(&self) -> &DispatchLayout {
        &self.layout
    }

    /// Scan constants this pipeline was compiled with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current indirect record template.
    #[must_use]
    pub const fn args_template(&self) -> &DrawIndexedIndirectArgs {
        &self.args_template
    }

    /// Candidate buffer, for upstream generators writing on the device.
    #[must_use]
    pub const fn candidate_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.candidates
    }

    /// Accepted instances; the first `instance_count` entries of the
    /// indirect record are meaningful.
    #[must_use]
    pub const fn compacted_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.compacted
    }

    /// Indirect draw record patched every frame.
    #[must_use]
    pub const fn indirect_args_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.args
    }

    pub(crate) const fn buffers(&self) -> &CullBuffers {
        &self.buffers
    }
}

fn bind_stages(
    device: &wgpu::Device,
    buffers: &CullBuffers,
    vote: &VoteStage,
    local_scan: &LocalScanStage,
    group_scan: &GroupScanStage,
    compact: &CompactStage,
) -> StageBindGroups {
    StageBindGroups {
        vote: vote.bind(
            device,
            &VoteBindings {
                params: &buffers.params,
                candidates: &buffers.candidates,
                votes: &buffers.votes,
            },
        ),
        local_scan: local_scan.bind(
            device,
            &LocalScanBindings {
                params: &buffers.params,
                votes: &buffers.votes,
                scan: &buffers.scan,
                group_sums: &buffers.group_sums,
            },
        ),
        group_scan: group_scan.bind(
            device,
            &GroupScanBindings {
                params: &buffers.params,
                group_sums: &buffers.group_sums,
                scanned_group_sums: &buffers.scanned_group_sums,
            },
        ),
        compact: compact.bind(
            device,
            &CompactBindings {
                params: &buffers.params,
                candidates: &buffers.candidates,
                votes: &buffers.votes,
                scan: &buffers.scan,
                scanned_group_sums: &buffers.scanned_group_sums,
                compacted: &buffers.compacted,
                visible_count: &buffers.visible_count,
            },
        ),
    }
}

fn limit(what: &'static str, required: u64, available: u64) -> GpuResult<()> {
    if required <= available {
        return Ok(());
    }
    tracing::warn!(what, required, available, "device limit exceeded");
    Err(GpuError::DeviceLimit {
        what,
        required,
        available,
    })
}

/// Checks a layout for payload `T` against device limits.
///
/// # Errors
///
/// [`GpuError::DeviceLimit`] naming the first limit exceeded.
pub fn check_limits<T: CullInstance>(limits: &wgpu::Limits, layout: &DispatchLayout) -> GpuResult<()> {
    let word = std::mem::size_of::<u32>() as u64;
    let block = u64::from(layout.block_size());
    let capacity = u64::from(layout.group_capacity());
    let payload_bytes = u64::from(layout.instance_count()) * std::mem::size_of::<T>() as u64;

    limit(
        "max_compute_invocations_per_workgroup",
        block,
        u64::from(limits.max_compute_invocations_per_workgroup),
    )?;
    limit(
        "max_compute_workgroup_size_x",
        block,
        u64::from(limits.max_compute_workgroup_size_x),
    )?;
    limit(
        "max_compute_workgroup_storage_size",
        capacity.max(block) * word,
        u64::from(limits.max_compute_workgroup_storage_size),
    )?;
    limit(
        "max_storage_buffers_per_shader_stage",
        u64::from(COMPACT_STORAGE_BINDINGS),
        u64::from(limits.max_storage_buffers_per_shader_stage),
    )?;
    limit(
        "max_compute_workgroups_per_dimension",
        u64::from(layout.num_blocks()),
        u64::from(limits.max_compute_workgroups_per_dimension),
    )?;
    limit(
        "max_storage_buffer_binding_size",
        payload_bytes,
        u64::from(limits.max_storage_buffer_binding_size),
    )?;
    limit("max_buffer_size", payload_bytes, limits.max_buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meadow_core::{BladeInstance, PropInstance};

    #[test]
    fn test_default_limits_accept_default_layout() {
        let layout = DispatchLayout::with_defaults(128 * 1024).unwrap();
        assert!(check_limits::<BladeInstance>(&wgpu::Limits::default(), &layout).is_ok());
        assert!(check_limits::<PropInstance>(&wgpu::Limits::default(), &layout).is_ok());
    }

    #[test]
    fn test_block_larger_than_workgroup() {
        let layout = DispatchLayout::new(1024, 512, 1024).unwrap();
        let limits = wgpu::Limits::downlevel_defaults();
        match check_limits::<BladeInstance>(&limits, &layout) {
            Err(GpuError::DeviceLimit { what, required, .. }) => {
                assert_eq!(what, "max_compute_invocations_per_workgroup");
                assert_eq!(required, 512);
            }
            other => panic!("expected limit error, got {other:?}"),
        }
    }

    #[test]
    fn test_group_capacity_storage() {
        let layout = DispatchLayout::new(1, 128, 8192).unwrap();
        let limits = wgpu::Limits {
            max_compute_workgroup_storage_size: 16384,
            ..wgpu::Limits::default()
        };
        assert!(matches!(
            check_limits::<BladeInstance>(&limits, &layout),
            Err(GpuError::DeviceLimit {
                what: "max_compute_workgroup_storage_size",
                required: 32768,
                ..
            })
        ));
    }
}
