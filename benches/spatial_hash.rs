// Neighbor search benchmarks
//
// Compares the sparse hash used by the host backend with the dense cell grid
// uploaded to the device, plus one full host step.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fluid_engine::backend::{ComputeBackend, CpuBackend, StepInput};
use fluid_engine::constants::kernel::{CELL_SIZE, INTERACTION_RADIUS};
use fluid_engine::{CellGrid, Environment, Material, ParticleSet, SimulationState, SpatialHash};
use std::sync::Arc;
use std::time::Duration;

const CANVAS_SIZES: &[(f32, f32)] = &[(400.0, 400.0), (1200.0, 800.0), (2400.0, 1600.0)];

fn grid_state(width: f32, height: f32) -> SimulationState {
    let particles = ParticleSet::grid(width, height, Material::Water);
    SimulationState::default()
        .with_particles(Arc::new(particles))
        .with_environment(Environment {
            width,
            height,
            gravity: 300.0,
            viscosity: 0.5,
            repulsion: 500.0,
            surface_tension: 0.5,
            ..Environment::default()
        })
}

fn bench_hash_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_hash_rebuild");
    group.measurement_time(Duration::from_secs(5));

    for &(width, height) in CANVAS_SIZES {
        let state = grid_state(width, height);
        let kinematics = state.particles().kinematics();
        let label = state.particle_count();

        group.bench_with_input(BenchmarkId::new("sparse", label), &kinematics, |b, k| {
            let mut hash = SpatialHash::new(CELL_SIZE);
            b.iter(|| {
                hash.rebuild(black_box(k));
                black_box(hash.len());
            });
        });

        group.bench_with_input(BenchmarkId::new("dense", label), &kinematics, |b, k| {
            let mut grid = CellGrid::new(CELL_SIZE, width, height);
            b.iter(|| {
                grid.rebuild(black_box(k), width, height);
                black_box(grid.sorted_indices().len());
            });
        });
    }

    group.finish();
}

fn bench_hash_query(c: &mut Criterion) {
    let state = grid_state(1200.0, 800.0);
    let particles = state.particles();
    let mut hash = SpatialHash::new(CELL_SIZE);
    hash.rebuild(particles.kinematics());

    c.bench_function("spatial_hash_query_all", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for position in particles.positions() {
                total += hash.query_neighbors(position.x, position.y, INTERACTION_RADIUS).len();
            }
            black_box(total)
        });
    });
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_backend_step");
    group.sample_size(20);

    for &(width, height) in CANVAS_SIZES {
        let state = grid_state(width, height);
        let mut backend = CpuBackend::new();
        if backend.prepare(state.particle_count()).is_err() {
            continue;
        }

        group.bench_function(BenchmarkId::from_parameter(state.particle_count()), |b| {
            b.iter(|| {
                let input = StepInput::from_state(&state, 1.0 / 60.0);
                black_box(backend.step(&input).map(|out| out.kinematics.len()).unwrap_or(0))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash_rebuild, bench_hash_query, bench_cpu_step);
criterion_main!(benches);
