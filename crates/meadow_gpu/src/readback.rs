//! Diagnostics readback.
//!
//! Blocking copies of device buffers back to the host. Debug-only: every
//! call waits for the device to go idle, which is exactly the stall the
//! frame path avoids. Never call these inside the steady-state loop.

use meadow_core::{CullInstance, CullStats, DrawIndexedIndirectArgs, ReferenceExecutor};

use crate::error::{GpuError, GpuResult};
use crate::pipeline::CullPipeline;

/// Reads `count` elements of `T` from the start of `src`.
///
/// `src` needs `COPY_SRC`; `count * size_of::<T>()` must be a multiple of 4.
///
/// # Errors
///
/// [`GpuError::Readback`] if mapping fails, [`GpuError::ReadbackDisconnected`]
/// if the map callback never reports.
pub fn read_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    count: usize,
) -> GpuResult<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let size = (count * std::mem::size_of::<T>()) as u64;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("meadow_readback"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("meadow_readback"),
    });
    encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        // Receiver outlives the poll below
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| GpuError::ReadbackDisconnected)??;

    let range = slice.get_mapped_range();
    let result: Vec<T> = bytemuck::cast_slice(&range).to_vec();
    drop(range);
    staging.unmap();

    Ok(result)
}

/// Host copy of every buffer after one culling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSnapshot<T> {
    /// Vote flags (N).
    pub votes: Vec<u32>,
    /// Block-local offsets (N).
    pub scan: Vec<u32>,
    /// Per-block totals (padded blocks).
    pub group_sums: Vec<u32>,
    /// Per-block base offsets (padded blocks).
    pub scanned_group_sums: Vec<u32>,
    /// The first `visible_count` compacted instances.
    pub compacted: Vec<T>,
    /// Device visible counter.
    pub visible_count: u32,
    /// Indirect record as the renderer would see it.
    pub args: DrawIndexedIndirectArgs,
}

/// Outcome of checking a snapshot against the host executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Candidates whose device vote differs from the host predicate.
    pub vote_mismatches: usize,
    /// Scan, group sums, compaction and count equal the host run over the
    /// device votes.
    pub compaction_matches: bool,
    /// The indirect record carries the visible count.
    pub args_patched: bool,
}

impl Verification {
    /// Everything matched.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.vote_mismatches == 0 && self.compaction_matches && self.args_patched
    }
}

impl<T: CullInstance> DiagnosticSnapshot<T> {
    /// Visible / culled summary.
    #[must_use]
    pub fn stats(&self) -> CullStats {
        CullStats::new(self.votes.len() as u32, self.visible_count)
    }

    /// Compares against the host executor.
    ///
    /// Votes are checked against `host_votes`. Scan and compaction are
    /// re-run on the host from the device votes, so predicate rounding at a
    /// plane boundary cannot mask a scan defect.
    ///
    /// # Errors
    ///
    /// [`meadow_core::CullError::CandidateCountMismatch`] if `candidates` does
    /// not match the executor layout.
    pub fn verify(&self, executor: &ReferenceExecutor, candidates: &[T], host_votes: &[u32]) -> GpuResult<Verification>
    where
        T: PartialEq,
    {
        let vote_mismatches = self
            .votes
            .iter()
            .zip(host_votes)
            .filter(|(device, host)| device != host)
            .count()
            + self.votes.len().abs_diff(host_votes.len());

        let expected = executor.run_with_votes(candidates, self.votes.clone())?;
        let compaction_matches = expected.scan == self.scan
            && expected.group_sums == self.group_sums
            && expected.scanned_group_sums == self.scanned_group_sums
            && expected.compacted == self.compacted
            && expected.visible_count == self.visible_count;

        Ok(Verification {
            vote_mismatches,
            compaction_matches,
            args_patched: self.args.instance_count == self.visible_count,
        })
    }
}

impl<T: CullInstance> CullPipeline<T> {
    /// Reads every stage buffer, the counter and the indirect record.
    ///
    /// Debug-only: blocks until the device is idle.
    ///
    /// # Errors
    ///
    /// See [`read_buffer`].
    pub fn read_diagnostics(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> GpuResult<DiagnosticSnapshot<T>> {
        let layout = self.layout();
        let buffers = self.buffers();
        let n = layout.instance_count() as usize;
        let padded = layout.padded_blocks() as usize;

        let visible_count = read_buffer::<u32>(device, queue, &buffers.visible_count, 1)?
            .first()
            .copied()
            .unwrap_or(0);
        let args = read_buffer::<DrawIndexedIndirectArgs>(device, queue, &buffers.args, 1)?
            .first()
            .copied()
            .unwrap_or_default();

        // Clamp in case the counter is corrupt; the snapshot then shows it
        let live = (visible_count as usize).min(n);

        let snapshot = DiagnosticSnapshot {
            votes: read_buffer(device, queue, &buffers.votes, n)?,
            scan: read_buffer(device, queue, &buffers.scan, n)?,
            group_sums: read_buffer(device, queue, &buffers.group_sums, padded)?,
            scanned_group_sums: read_buffer(device, queue, &buffers.scanned_group_sums, padded)?,
            compacted: read_buffer(device, queue, &buffers.compacted, live)?,
            visible_count,
            args,
        };

        tracing::debug!(
            visible = snapshot.visible_count,
            total = n,
            "read culling diagnostics"
        );
        Ok(snapshot)
    }
}
