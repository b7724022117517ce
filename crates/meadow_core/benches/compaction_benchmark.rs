//! Benchmark for the host reference executor.
//!
//! Run with: cargo bench --package meadow_core --bench compaction_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meadow_core::frustum::{look_at, mat4_mul, perspective};
use meadow_core::layout::padded_block_count;
use meadow_core::reference::work_efficient_scan;
use meadow_core::{DispatchLayout, FieldConfig, FieldGenerator, FrameParams, Heightmap, ReferenceExecutor};

fn benchmark_block_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_scan");

    for size in [128usize, 1024] {
        let input: Vec<u32> = (0..size).map(|i| (i % 2) as u32).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            let mut data = input.clone();
            b.iter(|| {
                data.copy_from_slice(input);
                black_box(work_efficient_scan(&mut data))
            });
        });
    }

    group.finish();
}

fn benchmark_layout_policy(c: &mut Criterion) {
    c.bench_function("padded_block_count", |b| {
        let mut n = 0u32;
        b.iter(|| {
            n = n.wrapping_add(97) % 4096;
            black_box(padded_block_count(black_box(n), 1024))
        });
    });
}

fn benchmark_full_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference_pass");
    group.sample_size(20);

    for density in [1u32, 4, 8] {
        let config = FieldConfig {
            density,
            ..FieldConfig::default()
        };
        let heightmap = Heightmap::from_fn(64, 64, |x, y| ((x ^ y) % 7) as f32 / 7.0);
        let Ok(field) = FieldGenerator::new(config).generate(&heightmap) else {
            continue;
        };
        let Ok(layout) = DispatchLayout::with_defaults(field.len() as u32) else {
            continue;
        };
        let exec = ReferenceExecutor::new(layout);

        let eye = [0.0, 30.0, 0.0];
        let frame = FrameParams::new(
            mat4_mul(
                &perspective(70f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0),
                &look_at(eye, [100.0, 0.0, 100.0], [0.0, 1.0, 0.0]),
            ),
            eye,
            250.0,
        );

        group.throughput(Throughput::Elements(field.len() as u64));
        group.bench_with_input(BenchmarkId::new("density", density), &field, |b, field| {
            b.iter(|| black_box(exec.run(field, &frame)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_block_scan, benchmark_layout_policy, benchmark_full_pass);
criterion_main!(benches);
