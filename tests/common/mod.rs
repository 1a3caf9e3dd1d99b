//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fluid_engine::backend::{BackendLifecycle, ComputeBackend, CpuBackend, StepInput, StepOutput};
use fluid_engine::{BackendKind, Engine, EngineResult, Material, SimulationConfig};
use parking_lot::Mutex;

pub const DT: f32 = 1.0 / 60.0;

/// Small canvas on the host backend
pub fn cpu_config() -> SimulationConfig {
    SimulationConfig {
        width: 300.0,
        height: 300.0,
        backend: BackendKind::Cpu,
        ..SimulationConfig::default()
    }
}

pub fn cpu_engine(config: SimulationConfig) -> Engine {
    let mut engine = Engine::with_backend(config, Box::new(CpuBackend::new()));
    engine.seed_rng(42);
    engine
}

/// One call observed by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Prepare(usize),
    Step { particles: usize, dt: f32 },
    SetDensity(Material, f32),
    Close,
}

/// Host backend that logs every call it receives
pub struct RecordingBackend {
    inner: CpuBackend,
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl RecordingBackend {
    pub fn new() -> (Self, Arc<Mutex<Vec<BackendCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = Self {
            inner: CpuBackend::new(),
            calls: Arc::clone(&calls),
        };
        (backend, calls)
    }
}

impl ComputeBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn prepare(&mut self, particle_count: usize) -> EngineResult<()> {
        self.calls.lock().push(BackendCall::Prepare(particle_count));
        self.inner.prepare(particle_count)
    }

    fn step(&mut self, input: &StepInput<'_>) -> EngineResult<StepOutput> {
        self.calls.lock().push(BackendCall::Step {
            particles: input.particle_count(),
            dt: input.dt,
        });
        self.inner.step(input)
    }

    fn set_material_density(&mut self, material: Material, density: f32) {
        self.calls.lock().push(BackendCall::SetDensity(material, density));
        self.inner.set_material_density(material, density);
    }

    fn lifecycle(&self) -> BackendLifecycle {
        self.inner.lifecycle()
    }

    fn close(&mut self) {
        self.calls.lock().push(BackendCall::Close);
        self.inner.close();
    }
}
