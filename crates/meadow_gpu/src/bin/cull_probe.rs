//! # MEADOW Cull Probe
//!
//! Headless run of the culling pipeline: generates a field from the config,
//! culls it for a number of frames with an orbiting camera, then reads the
//! device buffers once and checks them against the host executor.
//!
//! ```text
//! cull_probe [config.toml] [frames]
//! ```
//!
//! Log level via `RUST_LOG` (default `info`).

use std::process::ExitCode;
use std::time::Instant;

use meadow_core::frustum::{look_at, mat4_mul, perspective};
use meadow_core::reference::vote;
use meadow_core::{BladeInstance, FieldGenerator, FrameParams, Heightmap, MeadowConfig, ReferenceExecutor};
use meadow_gpu::{CullPipeline, GpuContext, GpuResult};
use tracing_subscriber::EnvFilter;

const DEFAULT_FRAMES: u32 = 120;

/// Rolling hills so the field is not flat.
fn demo_heightmap() -> Heightmap {
    Heightmap::from_fn(128, 128, |x, y| {
        let fx = x as f32 / 127.0 * std::f32::consts::TAU;
        let fy = y as f32 / 127.0 * std::f32::consts::TAU;
        0.5 + 0.25 * fx.sin() * fy.cos()
    })
}

/// Camera circling the field centre, looking slightly down.
fn orbit_frame(config: &MeadowConfig, frame: u32, frames: u32) -> FrameParams {
    let angle = frame as f32 / frames as f32 * std::f32::consts::TAU;
    let radius = config.field.terrain_size * 0.35;
    let eye = [angle.cos() * radius, config.field.height_scale + 20.0, angle.sin() * radius];
    let view = look_at(eye, [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
    let proj = perspective(70f32.to_radians(), 16.0 / 9.0, 0.1, config.cull.distance * 2.0);

    FrameParams::new(mat4_mul(&proj, &view), eye, config.cull.distance).with_mode(config.cull.mode())
}

/// `frames` must be at least 1.
fn run(config: &MeadowConfig, frames: u32) -> GpuResult<bool> {
    println!("[GPU] Initializing...");
    let ctx = GpuContext::headless()?;
    println!("[GPU] Using: {}", ctx.adapter_info().name);

    let field = FieldGenerator::new(config.field.clone()).generate(&demo_heightmap())?;
    println!("[FIELD] {} candidates", field.len());

    let cull = CullPipeline::<BladeInstance>::new(&ctx.device, &config.pipeline, field.len() as u32)?;
    cull.upload_candidates(&ctx.queue, &field)?;

    // Steady state: no readback
    let start = Instant::now();
    for frame in 0..frames {
        cull.run_frame(&ctx.device, &ctx.queue, &orbit_frame(config, frame, frames));
    }
    ctx.device.poll(wgpu::Maintain::Wait);
    let elapsed = start.elapsed();
    println!(
        "[CULL] {frames} frames in {:.2} ms ({:.3} ms/frame)",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1000.0 / f64::from(frames)
    );

    // One diagnostics read after the loop
    let last = orbit_frame(config, frames - 1, frames);
    let snapshot = cull.read_diagnostics(&ctx.device, &ctx.queue)?;
    let executor = ReferenceExecutor::new(*cull.layout());
    let host_votes = vote(&field, &last.to_uniform(cull.layout()));
    let report = snapshot.verify(&executor, &field, &host_votes)?;

    println!("[STATS] {}", snapshot.stats());
    println!(
        "[CHECK] votes differing: {}, compaction: {}, indirect args: {}",
        report.vote_mismatches,
        if report.compaction_matches { "match" } else { "MISMATCH" },
        if report.args_patched { "patched" } else { "STALE" }
    );

    Ok(report.is_exact())
}

/// Frame count argument; at least one frame has to run before the check.
fn parse_frames(arg: Option<&str>) -> Result<u32, String> {
    match arg.map(str::parse::<u32>) {
        None => Ok(DEFAULT_FRAMES),
        Some(Ok(0)) => Err("must be at least 1".to_string()),
        Some(Ok(n)) => Ok(n),
        Some(Err(e)) => Err(e.to_string()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => MeadowConfig::load(&path),
        None => Ok(MeadowConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[CONFIG] {e}");
            return ExitCode::FAILURE;
        }
    };
    let frames = match parse_frames(args.next().as_deref()) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("[ARGS] frames: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config, frames) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("[GPU] {e}");
            ExitCode::FAILURE
        }
    }
}
