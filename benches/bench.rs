#![allow(clippy::all)] // Clippy will attempt to remove black_box() internals

use criterion::*;
use ndgrid::{
    Beam, ExecutionConfig, Grid, Index, IndexedData, Interpolation, RegularData, VectorIndex,
};

/// Smooth-ish 2D test field
fn gen_field(gridsize: usize, config: ExecutionConfig) -> Grid<f64, 2> {
    let mut grid = Grid::from_fn([gridsize, gridsize], |i| {
        let (x, y) = (i.value(0) as f64, i.value(1) as f64);
        (0.1 * x).sin() + (0.07 * y).cos()
    });
    grid.set_execution_config(config);
    grid
}

fn configs() -> [(&'static str, ExecutionConfig); 2] {
    [
        ("Sequential", ExecutionConfig::sequential()),
        ("Smart Fork", ExecutionConfig::default()),
    ]
}

macro_rules! bench_interp_specific {
    ($group:ident, $method:expr, $gridsize:expr, $size:expr) => {
        $group.throughput(Throughput::Elements(*$size as u64));
        for (label, config) in configs() {
            $group.bench_with_input(
                BenchmarkId::new(format!("{:?} {label}", $method), $size),
                $size,
                |b, &size| {
                    let source = gen_field($gridsize, ExecutionConfig::sequential())
                        .with_interpolation($method);
                    let m = (size as f64).sqrt().ceil() as usize;
                    let factor = ($gridsize - 1) as f64 / m as f64;
                    let mut out: Grid<f64, 2> = Grid::new([m, m]);
                    out.set_execution_config(config);

                    b.iter(|| {
                        black_box(
                            out.resample_from(
                                &source,
                                |i| {
                                    VectorIndex::new([
                                        factor * i.value(0) as f64,
                                        factor * i.value(1) as f64,
                                    ])
                                },
                                None,
                                None,
                            )
                            .unwrap(),
                        )
                    });
                },
            );
        }
    };
}

fn bench_interp(c: &mut Criterion) {
    let gridsize = 500;
    for method in [
        Interpolation::Nearest,
        Interpolation::Linear,
        Interpolation::Quadratic,
        Interpolation::Spline,
    ] {
        let mut group = c.benchmark_group(format!("Interp_2D_{method:?}_{gridsize}-grid"));
        for size in [100, 10_000, 1_000_000].iter() {
            bench_interp_specific!(group, method, gridsize, size);
        }
        group.finish();
    }
}

fn bench_stats(c: &mut Criterion) {
    for gridsize in [100, 1000] {
        let mut group = c.benchmark_group(format!("Stats_2D_{gridsize}-grid"));
        group.throughput(Throughput::Elements((gridsize * gridsize) as u64));
        for (label, config) in configs() {
            let grid = gen_field(gridsize, config);
            group.bench_function(format!("Mean {label}"), |b| {
                b.iter(|| black_box(grid.mean()))
            });
            group.bench_function(format!("Median {label}"), |b| {
                b.iter(|| black_box(grid.median()))
            });
            group.bench_function(format!("Index of Max {label}"), |b| {
                b.iter(|| black_box(grid.index_of_max()))
            });
        }
        group.finish();
    }
}

fn bench_smooth(c: &mut Criterion) {
    let gridsize = 300;
    let beam = Beam::gaussian([2.0, 2.0], 3.0).normalized();
    let mut group = c.benchmark_group(format!("Smooth_2D_{gridsize}-grid"));
    group.throughput(Throughput::Elements((gridsize * gridsize) as u64));
    for (label, config) in configs() {
        let grid = gen_field(gridsize, config);
        group.bench_function(format!("Direct {label}"), |b| {
            b.iter(|| black_box(grid.smoothed(&beam, None).unwrap()))
        });
        for step in [2, 4] {
            group.bench_function(format!("Fast step={step} {label}"), |b| {
                b.iter(|| {
                    black_box(
                        grid.fast_smoothed(&beam, &Index::new([step, step]), None)
                            .unwrap(),
                    )
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches_interp, bench_interp);
criterion_group!(benches_stats, bench_stats);
criterion_group!(benches_smooth, bench_smooth);
criterion_main!(benches_interp, benches_stats, benches_smooth,);
