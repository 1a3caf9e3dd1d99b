//! Compute backends
//!
//! A backend runs the two per-frame phases over the whole particle set:
//! neighbor build, then force accumulation and integration. It owns buffers
//! sized to the particle count and moves through an explicit lifecycle
//! (`Uninitialized -> Ready(n) -> Closed`). Callers must `prepare` the
//! backend for the current count before every `step`.

pub mod cpu;
pub mod gpu;
pub mod kernel;
pub mod kernel_source;
pub mod lifecycle;

pub use cpu::CpuBackend;
pub use gpu::GpuBackend;
pub use kernel::StepParams;
pub use kernel_source::KernelSource;
pub use lifecycle::{BackendLifecycle, BufferState, DensityOverrides};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::materials::Material;
use crate::particles::KINEMATIC_STRIDE;
use crate::state::{Environment, Forcing, SimulationState};

/// Borrowed inputs for one backend call
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    /// Interleaved `[x, y, vx, vy]`
    pub kinematics: &'a [f32],
    pub temperatures: &'a [f32],
    pub materials: &'a [u32],
    /// Flat material table, four floats per slot
    pub material_table: &'a [f32],
    pub environment: &'a Environment,
    pub forcing: &'a Forcing,
    pub dt: f32,
}

impl<'a> StepInput<'a> {
    pub fn from_state(state: &'a SimulationState, dt: f32) -> Self {
        let particles = state.particles();
        Self {
            kinematics: particles.kinematics(),
            temperatures: particles.temperatures(),
            materials: particles.materials(),
            material_table: state.material_table(),
            environment: state.environment(),
            forcing: state.forcing(),
            dt,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.temperatures.len()
    }

    /// Particle count, once every per-particle slice agrees on it
    pub fn validated_count(&self) -> EngineResult<usize> {
        let expected = self.particle_count();
        let lengths = [
            ("kinematics", self.kinematics.len(), expected * KINEMATIC_STRIDE),
            ("materials", self.materials.len(), expected),
        ];
        for (field, found, wanted) in lengths {
            if found != wanted {
                return Err(EngineError::ParticleCountMismatch {
                    field,
                    expected: wanted,
                    found,
                });
            }
        }
        Ok(expected)
    }
}

/// Fresh arrays produced by a backend call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutput {
    pub kinematics: Vec<f32>,
    pub temperatures: Vec<f32>,
}

/// Which backend the engine should construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// wgpu compute device
    #[default]
    Gpu,
    /// rayon-parallel host
    Cpu,
}

/// Executes neighbor build and force/integration over a particle set
pub trait ComputeBackend: Send {
    fn name(&self) -> &'static str;

    /// Make buffers match `particle_count`, reallocating if they do not
    fn prepare(&mut self, particle_count: usize) -> EngineResult<()>;

    /// Advance every particle by `input.dt`; input slices are never modified
    fn step(&mut self, input: &StepInput<'_>) -> EngineResult<StepOutput>;

    /// Override one material's density without touching particle buffers
    fn set_material_density(&mut self, material: Material, density: f32);

    fn lifecycle(&self) -> BackendLifecycle;

    /// Release every resource; calling it again does nothing
    fn close(&mut self);
}

/// Build the backend selected in configuration
///
/// Failure here is fatal: the engine cannot run without a backend.
pub fn create_backend(kind: BackendKind, kernels: &KernelSource) -> EngineResult<Box<dyn ComputeBackend>> {
    match kind {
        BackendKind::Gpu => Ok(Box::new(GpuBackend::new(kernels)?)),
        BackendKind::Cpu => Ok(Box::new(CpuBackend::new())),
    }
}
