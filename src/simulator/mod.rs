//! Fluid simulator
//!
//! Owns the canonical [`SimulationState`] and a compute backend. Each
//! `update` prepares the backend for the current particle count, runs one
//! step and publishes the new state to every registered listener.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{BackendLifecycle, ComputeBackend, StepInput};
use crate::error::EngineResult;
use crate::materials::Material;
use crate::persistence;
use crate::state::SimulationState;

/// Receives every new canonical state
pub trait SimulationListener: Send + Sync {
    fn on_simulation_updated(&self, state: &SimulationState);
}

/// Handle returned by [`ListenerRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    /// No step has completed yet
    Idle,
    Stepping,
}

type ListenerList = Vec<(ListenerId, Arc<dyn SimulationListener>)>;

/// Shared set of simulation listeners
///
/// Clones refer to the same registrations, so a listener may hold one and
/// add or remove listeners while it is being notified. Changes made during a
/// pass take effect from the next pass.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<ListenerList>>,
    next_id: Arc<AtomicU64>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn SimulationListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Returns false if `id` was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Notify every listener registered when the pass starts, in order
    pub fn notify(&self, state: &SimulationState) {
        let snapshot: ListenerList = self.listeners.read().clone();
        for (_, listener) in &snapshot {
            listener.on_simulation_updated(state);
        }
    }
}

pub struct FluidSimulator {
    backend: Box<dyn ComputeBackend>,
    state: SimulationState,
    phase: SimPhase,
    listeners: ListenerRegistry,
    steps: u64,
}

impl FluidSimulator {
    pub fn new(backend: Box<dyn ComputeBackend>, state: SimulationState) -> Self {
        log::info!(
            "Fluid simulator using {} backend, {} particles",
            backend.name(),
            state.particle_count()
        );
        Self {
            backend,
            state,
            phase: SimPhase::Idle,
            listeners: ListenerRegistry::new(),
            steps: 0,
        }
    }

    /// Advance the canonical state by `dt` and notify listeners
    ///
    /// Does nothing when there are no particles.
    pub fn update(&mut self, dt: f32) -> EngineResult<()> {
        if !self.state.has_particles() {
            return Ok(());
        }

        let current = self.state.clone();
        self.state = self.advance_detached(&current, dt)?;
        self.steps += 1;
        if self.phase == SimPhase::Idle {
            log::debug!("Simulator entered stepping phase");
            self.phase = SimPhase::Stepping;
        }

        self.notify_listeners();
        Ok(())
    }

    /// Run the backend for `state` without touching the canonical state
    pub fn advance_detached(&mut self, state: &SimulationState, dt: f32) -> EngineResult<SimulationState> {
        let count = state.particle_count();
        if count == 0 {
            return Ok(state.clone());
        }

        self.backend.prepare(count)?;
        let output = self.backend.step(&StepInput::from_state(state, dt))?;
        let particles = state
            .particles()
            .with_dynamics(output.kinematics, output.temperatures)?;
        Ok(state.with_particles(Arc::new(particles)))
    }

    /// Replace the canonical state without stepping or notifying
    pub fn set_state(&mut self, state: SimulationState) {
        self.state = state;
    }

    pub fn current_state(&self) -> &SimulationState {
        &self.state
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    /// Completed canonical steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Resize backend buffers to the current particle count
    pub fn prepare_backend(&mut self) -> EngineResult<()> {
        self.backend.prepare(self.state.particle_count())
    }

    pub fn backend_lifecycle(&self) -> BackendLifecycle {
        self.backend.lifecycle()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn set_material_density(&mut self, material: Material, density: f32) {
        self.backend.set_material_density(material, density);
    }

    pub fn add_listener(&self, listener: Arc<dyn SimulationListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Returns false if `id` was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Shared handle to the listener registrations
    pub fn listeners(&self) -> ListenerRegistry {
        self.listeners.clone()
    }

    pub fn notify_listeners(&self) {
        self.listeners.notify(&self.state);
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        persistence::save_snapshot(path, &self.state)
    }

    /// Replace the canonical state from a snapshot and notify listeners
    ///
    /// A missing or unreadable snapshot is logged and replaced by an empty
    /// state.
    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<()> {
        self.state = persistence::load_snapshot_or_default(path);
        self.prepare_backend()?;
        self.notify_listeners();
        Ok(())
    }

    pub fn close(&mut self) {
        self.backend.close();
    }
}
