//! # GPU Pipeline Integration Test
//!
//! Runs the device pipeline and compares every buffer with the host
//! executor. Returns early when the machine has no usable adapter.

use meadow_core::frustum::orthographic;
use meadow_core::reference::vote;
use meadow_core::{
    BladeInstance, CullError, CullInstance, CullMode, DrawIndexedIndirectArgs, FrameParams, PipelineConfig,
    PropInstance, ReferenceExecutor,
};
use meadow_gpu::{CullPipeline, GpuContext, GpuError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn context() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(GpuError::NoAdapter | GpuError::RequestDevice(_)) => {
            eprintln!("no GPU adapter, skipping");
            None
        }
        Err(e) => panic!("unexpected device error: {e}"),
    }
}

fn pipeline<T: CullInstance>(ctx: &GpuContext, config: &PipelineConfig, n: u32) -> Option<CullPipeline<T>> {
    match CullPipeline::new(&ctx.device, config, n) {
        Ok(p) => Some(p),
        Err(GpuError::DeviceLimit { what, .. }) => {
            eprintln!("adapter too small ({what}), skipping");
            None
        }
        Err(e) => panic!("pipeline creation failed: {e}"),
    }
}

/// Candidates on integer x; distance test against 10.5 from the origin
/// never lands near a rounding boundary.
fn line_of_blades(visible: &[bool]) -> Vec<BladeInstance> {
    visible
        .iter()
        .enumerate()
        .map(|(i, &v)| BladeInstance::new([if v { 1.0 + i as f32 } else { 100.0 + i as f32 }, 0.0, 0.0], 0.25))
        .collect()
}

const NEAR: FrameParams = FrameParams::distance_only([0.0, 0.0, 0.0], 10.5);

/// Test: N=8, B=4 with votes [1,0,1,1,0,0,1,0].
#[test]
fn test_eight_instances_two_blocks() {
    let Some(ctx) = context() else { return };
    let config = PipelineConfig {
        block_size: 4,
        group_capacity: 1024,
    };
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &config, 8) else { return };

    let field = line_of_blades(&[true, false, true, true, false, false, true, false]);
    cull.upload_candidates(&ctx.queue, &field).unwrap();
    cull.run_frame(&ctx.device, &ctx.queue, &NEAR);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    assert_eq!(snap.votes, vec![1, 0, 1, 1, 0, 0, 1, 0]);
    assert_eq!(snap.scan, vec![0, 1, 1, 2, 0, 0, 0, 1]);
    assert_eq!(snap.group_sums, vec![3, 1]);
    assert_eq!(snap.scanned_group_sums, vec![0, 3]);
    assert_eq!(snap.visible_count, 4);
    assert_eq!(snap.compacted, vec![field[0], field[2], field[3], field[6]]);
    assert_eq!(snap.args.instance_count, 4);
    assert_eq!(snap.args.index_count, 6);
}

/// Test: N=0 dispatches nothing and draws nothing.
#[test]
fn test_empty_pipeline() {
    let Some(ctx) = context() else { return };
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), 0) else { return };

    cull.upload_candidates(&ctx.queue, &[]).unwrap();
    cull.run_frame(&ctx.device, &ctx.queue, &NEAR);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    assert_eq!(snap.visible_count, 0);
    assert_eq!(snap.args.instance_count, 0);
    assert!(snap.compacted.is_empty());
    assert!(snap.group_sums.is_empty());
}

/// Test: N=B leaves a single-element identity group scan.
#[test]
fn test_exactly_one_block() {
    let Some(ctx) = context() else { return };
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), 128) else { return };

    let visible: Vec<bool> = (0..128).map(|i| i % 5 == 0).collect();
    let field = (0..128)
        .map(|i| BladeInstance::new([if visible[i] { 2.0 } else { 50.0 }, 0.0, 0.0], 0.25))
        .collect::<Vec<_>>();
    cull.upload_candidates(&ctx.queue, &field).unwrap();
    cull.run_frame(&ctx.device, &ctx.queue, &NEAR);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    assert_eq!(snap.scanned_group_sums, vec![0]);
    assert_eq!(snap.visible_count, 26);
}

/// Test: random integer grid, distance test, several blocks.
#[test]
fn test_matches_reference_executor() {
    let Some(ctx) = context() else { return };
    let n = 20_000;
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), n) else { return };

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let field: Vec<BladeInstance> = (0..n)
        .map(|_| {
            let x = rng.gen_range(-100i32..=100) as f32;
            let z = rng.gen_range(-100i32..=100) as f32;
            BladeInstance::new([x, 0.0, z], 0.5)
        })
        .collect();
    cull.upload_candidates(&ctx.queue, &field).unwrap();

    let frame = FrameParams::distance_only([3.0, 0.0, -4.0], 50.5);
    cull.run_frame(&ctx.device, &ctx.queue, &frame);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    let executor = ReferenceExecutor::new(*cull.layout());
    let host_votes = vote(&field, &frame.to_uniform(cull.layout()));
    let report = snap.verify(&executor, &field, &host_votes).unwrap();

    assert!(report.is_exact(), "{report:?}");
    let expected = executor.run(&field, &frame).unwrap();
    assert_eq!(snap.compacted, expected.compacted);
}

/// Test: frustum-only mode against an orthographic box.
#[test]
fn test_frustum_mode() {
    let Some(ctx) = context() else { return };
    let n = 1000;
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), n) else { return };

    // 10x10x10 grid at -15, -12, ..., 12; box half extent 10.25
    let field: Vec<BladeInstance> = (0..n)
        .map(|i| {
            let (x, y, z) = (i % 10, (i / 10) % 10, i / 100);
            BladeInstance::new([x as f32 * 3.0 - 15.0, y as f32 * 3.0 - 15.0, z as f32 * 3.0 - 15.0], 0.25)
        })
        .collect();
    cull.upload_candidates(&ctx.queue, &field).unwrap();

    let frame = FrameParams::new(orthographic(10.25), [0.0; 3], 0.0).with_mode(CullMode::FrustumOnly);
    cull.run_frame(&ctx.device, &ctx.queue, &frame);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    let executor = ReferenceExecutor::new(*cull.layout());
    let host_votes = vote(&field, &frame.to_uniform(cull.layout()));
    let report = snap.verify(&executor, &field, &host_votes).unwrap();

    assert!(report.is_exact(), "{report:?}");
    // Coordinates -15, -12, ..., 12: -9..9 survive, 7 of 10 per axis
    assert_eq!(snap.visible_count, 7 * 7 * 7);
}

/// Test: re-running the same frame gives identical buffers.
#[test]
fn test_rerun_is_identical() {
    let Some(ctx) = context() else { return };
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), 5000) else { return };

    let field: Vec<BladeInstance> = (0..5000)
        .map(|i| BladeInstance::new([(i % 71) as f32, 0.0, (i / 71) as f32], 0.5))
        .collect();
    cull.upload_candidates(&ctx.queue, &field).unwrap();
    let frame = FrameParams::distance_only([35.0, 0.0, 35.0], 30.5);

    cull.run_frame(&ctx.device, &ctx.queue, &frame);
    let first = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    cull.run_frame(&ctx.device, &ctx.queue, &frame);
    let second = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();

    assert_eq!(first, second);
}

/// Test: resize reallocates only when N changes and keeps the template.
#[test]
fn test_resize_and_template() {
    let Some(ctx) = context() else { return };
    let Some(mut cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), 16) else { return };

    cull.set_args_template(&ctx.queue, DrawIndexedIndirectArgs::for_mesh(36, 12, 4));
    assert!(!cull.resize(&ctx.device, 16).unwrap());
    assert!(cull.resize(&ctx.device, 300).unwrap());
    assert_eq!(cull.layout().num_blocks(), 3);

    let err = cull.upload_candidates(&ctx.queue, &line_of_blades(&[true; 16])).unwrap_err();
    assert!(matches!(
        err,
        GpuError::Cull(CullError::CandidateCountMismatch { expected: 300, actual: 16 })
    ));

    let field = line_of_blades(&[true; 300]);
    cull.upload_candidates(&ctx.queue, &field).unwrap();
    cull.run_frame(&ctx.device, &ctx.queue, &FrameParams::distance_only([0.0; 3], 1000.0));

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    assert_eq!(snap.visible_count, 300);
    assert_eq!(snap.args, DrawIndexedIndirectArgs {
        instance_count: 300,
        ..DrawIndexedIndirectArgs::for_mesh(36, 12, 4)
    });
}

/// Test: the renderer can bind the compacted buffer as a vertex buffer.
#[test]
fn test_compacted_buffer_usage() {
    let Some(ctx) = context() else { return };
    let Some(cull) = pipeline::<BladeInstance>(&ctx, &PipelineConfig::default(), 256) else { return };

    let usage = cull.compacted_buffer().usage();
    assert!(usage.contains(wgpu::BufferUsages::VERTEX), "{usage:?}");
    assert!(usage.contains(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC));
    assert!(cull.indirect_args_buffer().usage().contains(wgpu::BufferUsages::INDIRECT));
}

/// Test: 48-byte props with custom block and group sizes match the host.
#[test]
fn test_prop_payload_custom_layout() {
    let Some(ctx) = context() else { return };
    let config = PipelineConfig {
        block_size: 64,
        group_capacity: 256,
    };
    let Some(cull) = pipeline::<PropInstance>(&ctx, &config, 3000) else { return };
    assert_eq!(cull.layout().num_blocks(), 47);

    // Integer centres and radii keep every test away from the boundaries
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let props: Vec<PropInstance> = (0..3000)
        .map(|_| {
            let p = [0; 3].map(|_: i32| rng.gen_range(-40i32..=40) as f32);
            let s = [0; 3].map(|_: i32| rng.gen_range(0i32..=3) as f32);
            PropInstance::new(p, s, [0.0, 0.0, 0.0, 1.0])
        })
        .collect();
    cull.upload_candidates(&ctx.queue, &props).unwrap();

    let frame = FrameParams::new(orthographic(30.25), [0.0; 3], 40.5);
    cull.run_frame(&ctx.device, &ctx.queue, &frame);

    let snap = cull.read_diagnostics(&ctx.device, &ctx.queue).unwrap();
    let executor = ReferenceExecutor::new(*cull.layout());
    let host_votes = vote(&props, &frame.to_uniform(cull.layout()));
    let report = snap.verify(&executor, &props, &host_votes).unwrap();

    assert!(report.is_exact(), "{report:?}");
    let expected = executor.run(&props, &frame).unwrap();
    assert_eq!(snap.compacted, expected.compacted);
    assert_eq!(snap.args.instance_count, expected.visible_count);
}

/// Test: a layout needing a third scan tier is refused.
#[test]
fn test_capacity_overflow_refused() {
    let Some(ctx) = context() else { return };
    let err = CullPipeline::<BladeInstance>::new(&ctx.device, &PipelineConfig::default(), 128 * 1024 + 1).unwrap_err();
    assert!(matches!(err, GpuError::Cull(CullError::CapacityOverflow { .. })));
}
