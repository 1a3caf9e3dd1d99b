//! Host compute backend
//!
//! Runs the same two passes as the device kernels with rayon: a spatial hash
//! neighbor build into fixed-width neighbor slots, then a parallel force and
//! integration pass writing fresh output arrays.

use rayon::prelude::*;

use crate::constants::kernel;
use crate::error::{EngineError, EngineResult};
use crate::materials::Material;
use crate::particles::KINEMATIC_STRIDE;
use crate::spatial_hash::SpatialHash;

use super::kernel::{integrate_particle, StepParams};
use super::lifecycle::{BackendLifecycle, BufferState, DensityOverrides};
use super::{ComputeBackend, StepInput, StepOutput};

/// Neighbor slots sized for one particle count
#[derive(Debug)]
struct NeighborBuffers {
    /// `MAX_NEIGHBORS` slots per particle
    indices: Vec<u32>,
    counts: Vec<u32>,
}

impl NeighborBuffers {
    fn new(particle_count: usize) -> Self {
        Self {
            indices: vec![0; particle_count * kernel::MAX_NEIGHBORS],
            counts: vec![0; particle_count],
        }
    }
}

pub struct CpuBackend {
    buffers: BufferState<NeighborBuffers>,
    hash: SpatialHash,
    overrides: DensityOverrides,
    table_scratch: Vec<f32>,
}

impl CpuBackend {
    pub fn new() -> Self {
        log::info!("Initialized CPU compute backend ({} threads)", rayon::current_num_threads());
        Self {
            buffers: BufferState::Uninitialized,
            hash: SpatialHash::new(kernel::CELL_SIZE),
            overrides: DensityOverrides::default(),
            table_scratch: Vec::new(),
        }
    }

    /// Neighbor count of particle `index` from the last step
    pub fn neighbor_count(&self, index: usize) -> Option<u32> {
        match &self.buffers {
            BufferState::Ready { buffers, .. } => buffers.counts.get(index).copied(),
            _ => None,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn prepare(&mut self, particle_count: usize) -> EngineResult<()> {
        if self.buffers.is_closed() {
            return Err(EngineError::BackendClosed);
        }
        if self.buffers.is_ready_for(particle_count) {
            return Ok(());
        }

        log::debug!(
            "Resizing CPU neighbor buffers: {:?} -> {} particles",
            self.buffers.particle_count(),
            particle_count
        );
        self.buffers = BufferState::Ready {
            particle_count,
            buffers: NeighborBuffers::new(particle_count),
        };
        Ok(())
    }

    fn step(&mut self, input: &StepInput<'_>) -> EngineResult<StepOutput> {
        let n = input.validated_count()?;
        let buffers = self.buffers.ready_mut(n)?;
        if n == 0 {
            return Ok(StepOutput::default());
        }

        let params = StepParams::new(input, 0, 0);
        let kinematics = input.kinematics;
        let radius_sq = params.interaction_radius * params.interaction_radius;

        // Step 1: neighbor build
        self.hash.rebuild(kinematics);
        let hash = &self.hash;
        buffers
            .indices
            .par_chunks_mut(kernel::MAX_NEIGHBORS)
            .zip(buffers.counts.par_iter_mut())
            .enumerate()
            .for_each(|(i, (slots, count))| {
                let base = i * KINEMATIC_STRIDE;
                let (px, py) = (kinematics[base], kinematics[base + 1]);
                let mut found = 0usize;
                hash.for_each_candidate(px, py, params.interaction_radius, |j| {
                    if j as usize == i || found >= kernel::MAX_NEIGHBORS {
                        return;
                    }
                    let other = j as usize * KINEMATIC_STRIDE;
                    let (dx, dy) = (px - kinematics[other], py - kinematics[other + 1]);
                    if dx * dx + dy * dy < radius_sq {
                        slots[found] = j;
                        found += 1;
                    }
                });
                *count = found as u32;
            });

        // Step 2: forces and integration
        self.overrides.apply(input.material_table, &mut self.table_scratch);
        let table = &self.table_scratch;
        let indices = &buffers.indices;
        let counts = &buffers.counts;

        let mut out_kinematics = vec![0.0f32; kinematics.len()];
        let mut out_temperatures = vec![0.0f32; n];
        out_kinematics
            .par_chunks_mut(KINEMATIC_STRIDE)
            .zip(out_temperatures.par_iter_mut())
            .enumerate()
            .for_each(|(i, (particle, temperature))| {
                let start = i * kernel::MAX_NEIGHBORS;
                let neighbors = &indices[start..start + counts[i] as usize];
                let (next, next_temperature) = integrate_particle(
                    i,
                    neighbors,
                    kinematics,
                    input.temperatures,
                    input.materials,
                    table,
                    &params,
                );
                particle.copy_from_slice(&next);
                *temperature = next_temperature;
            });

        Ok(StepOutput {
            kinematics: out_kinematics,
            temperatures: out_temperatures,
        })
    }

    fn set_material_density(&mut self, material: Material, density: f32) {
        self.overrides.set(material, density);
    }

    fn lifecycle(&self) -> BackendLifecycle {
        self.buffers.lifecycle()
    }

    fn close(&mut self) {
        if !self.buffers.is_closed() {
            log::info!("Closing CPU compute backend");
            self.buffers = BufferState::Closed;
            self.hash.clear();
        }
    }
}

impl Drop for CpuBackend {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialTable;
    use crate::state::{Environment, Forcing};

    fn canvas() -> Environment {
        Environment {
            width: 800.0,
            height: 600.0,
            ..Environment::default()
        }
    }

    fn step(
        backend: &mut CpuBackend,
        kinematics: &[f32],
        env: &Environment,
    ) -> EngineResult<StepOutput> {
        let n = kinematics.len() / 4;
        let temperatures = vec![20.0; n];
        let materials = vec![0; n];
        let table = MaterialTable::new().encode();
        let forcing = Forcing::default();
        backend.step(&StepInput {
            kinematics,
            temperatures: &temperatures,
            materials: &materials,
            material_table: &table,
            environment: env,
            forcing: &forcing,
            dt: 1.0 / 60.0,
        })
    }

    #[test]
    fn ragged_input_is_rejected() {
        let mut backend = CpuBackend::new();
        backend.prepare(3).unwrap();
        let kinematics = [100.0, 100.0, 0.0, 0.0, 105.0, 100.0, 0.0, 0.0];
        let temperatures = [20.0; 3];
        let table = MaterialTable::new().encode();
        let env = canvas();
        let forcing = Forcing::default();
        let mut input = StepInput {
            kinematics: &kinematics,
            temperatures: &temperatures,
            materials: &[0; 3],
            material_table: &table,
            environment: &env,
            forcing: &forcing,
            dt: 1.0 / 60.0,
        };

        assert!(matches!(
            backend.step(&input),
            Err(EngineError::ParticleCountMismatch {
                field: "kinematics",
                expected: 12,
                found: 8,
            })
        ));

        let full = [0.0; 12];
        input.kinematics = &full;
        input.materials = &[0; 2];
        assert!(matches!(
            backend.step(&input),
            Err(EngineError::ParticleCountMismatch { field: "materials", .. })
        ));
        assert_eq!(backend.lifecycle(), BackendLifecycle::Ready { particle_count: 3 });
    }

    #[test]
    fn lifecycle_follows_prepare_and_close() {
        let mut backend = CpuBackend::new();
        assert_eq!(backend.lifecycle(), BackendLifecycle::Uninitialized);

        backend.prepare(3).unwrap();
        assert_eq!(backend.lifecycle(), BackendLifecycle::Ready { particle_count: 3 });

        backend.close();
        backend.close();
        assert_eq!(backend.lifecycle(), BackendLifecycle::Closed);
        assert!(matches!(backend.prepare(3), Err(EngineError::BackendClosed)));
    }

    #[test]
    fn step_without_matching_prepare_fails() {
        let mut backend = CpuBackend::new();
        backend.prepare(1).unwrap();
        let result = step(&mut backend, &[10.0, 10.0, 0.0, 0.0, 20.0, 20.0, 0.0, 0.0], &canvas());
        assert!(matches!(
            result,
            Err(EngineError::BufferSizeMismatch { prepared: 1, requested: 2 })
        ));
    }

    #[test]
    fn step_after_close_fails() {
        let mut backend = CpuBackend::new();
        backend.prepare(1).unwrap();
        backend.close();
        let result = step(&mut backend, &[10.0, 10.0, 0.0, 0.0], &canvas());
        assert!(matches!(result, Err(EngineError::BackendClosed)));
    }

    #[test]
    fn output_lengths_match_input() {
        let mut backend = CpuBackend::new();
        let kinematics: Vec<f32> = (0..10).flat_map(|i| [i as f32 * 5.0 + 100.0, 100.0, 0.0, 0.0]).collect();
        backend.prepare(10).unwrap();
        let out = step(&mut backend, &kinematics, &canvas()).unwrap();
        assert_eq!(out.kinematics.len(), 40);
        assert_eq!(out.temperatures.len(), 10);
    }

    #[test]
    fn neighbors_are_truncated_at_capacity() {
        let mut backend = CpuBackend::new();
        // 100 particles packed into a 10x10 block well inside the radius
        let kinematics: Vec<f32> = (0..100)
            .flat_map(|i| [300.0 + (i % 10) as f32, 300.0 + (i / 10) as f32, 0.0, 0.0])
            .collect();
        backend.prepare(100).unwrap();
        step(&mut backend, &kinematics, &canvas()).unwrap();
        assert_eq!(backend.neighbor_count(0), Some(kernel::MAX_NEIGHBORS as u32));
    }

    #[test]
    fn neighbor_lists_exclude_self_and_far_particles() {
        let mut backend = CpuBackend::new();
        let kinematics = [100.0, 100.0, 0.0, 0.0, 120.0, 100.0, 0.0, 0.0, 400.0, 400.0, 0.0, 0.0];
        backend.prepare(3).unwrap();
        step(&mut backend, &kinematics, &canvas()).unwrap();
        assert_eq!(backend.neighbor_count(0), Some(1));
        assert_eq!(backend.neighbor_count(2), Some(0));
    }

    #[test]
    fn density_override_changes_repulsion() {
        let env = Environment {
            repulsion: 1000.0,
            ..canvas()
        };
        let kinematics = [100.0, 100.0, 0.0, 0.0, 110.0, 100.0, 0.0, 0.0];

        let mut plain = CpuBackend::new();
        plain.prepare(2).unwrap();
        let base = step(&mut plain, &kinematics, &env).unwrap();

        let mut heavy = CpuBackend::new();
        heavy.set_material_density(Material::Water, 2.0);
        heavy.prepare(2).unwrap();
        let boosted = step(&mut heavy, &kinematics, &env).unwrap();

        assert!(boosted.kinematics[2].abs() > base.kinematics[2].abs());
    }
}
