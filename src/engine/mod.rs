//! Engine orchestration
//!
//! [`Engine`] owns the simulator and every temporal control and advances them
//! together, one `tick` at a time. All outside influence arrives through the
//! input queue and is applied at the start of the next tick.

pub mod driver;

pub use driver::{DriverHandle, FixedRateDriver};

use std::path::Path;
use std::sync::Arc;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::{self, BackendLifecycle, ComputeBackend, KernelSource};
use crate::config::{ranges, SimulationConfig};
use crate::constants::{pointer, thermal};
use crate::error::EngineResult;
use crate::input::{InputEvent, InputQueue, InputSender, MouseMode, ParameterChange, PointerButton, PointerState};
use crate::materials::{Material, MaterialCache, MaterialTable};
use crate::particles::{DiscEmitter, ParticleSet, TemperatureBrush};
use crate::persistence;
use crate::simulator::{FluidSimulator, ListenerId, ListenerRegistry, SimulationListener};
use crate::state::{Environment, ForceMode, Forcing, SimulationState};
use crate::temporal::{GhostBranch, HistoryBuffer, LoopRecorder, TimeAcceleration};

pub struct Engine {
    config: SimulationConfig,
    simulator: FluidSimulator,
    history: HistoryBuffer,
    ghost: GhostBranch,
    loop_recorder: LoopRecorder,
    acceleration: TimeAcceleration,
    input: InputQueue,
    pointer: PointerState,
    mouse_mode: MouseMode,
    emitter: DiscEmitter,
    brush: TemperatureBrush,
    material_table: MaterialTable,
    material_cache: MaterialCache,
    rewinding: bool,
    rng: StdRng,
    ticks: u64,
}

impl Engine {
    /// Build the configured backend and initial state
    ///
    /// Backend and kernel failures are returned; a missing or corrupt
    /// snapshot falls back to an empty canvas.
    pub fn new(config: SimulationConfig) -> EngineResult<Self> {
        let kernels = match &config.kernel_dir {
            Some(dir) => KernelSource::from_dir(dir)?,
            None => KernelSource::embedded(),
        };
        let backend = backend::create_backend(config.backend, &kernels)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: SimulationConfig, backend: Box<dyn ComputeBackend>) -> Self {
        let config = config.clamped();
        let material_table = MaterialTable::new();
        let material_cache = MaterialCache::new();

        let initial = match &config.snapshot {
            Some(path) => persistence::load_snapshot_or_default(path),
            None => {
                let particles = ParticleSet::grid(config.width, config.height, config.material);
                SimulationState::default().with_particles(Arc::new(particles))
            }
        };
        let state = initial
            .with_environment(Self::environment_from(&config))
            .with_material_table(material_cache.encoded(&material_table));

        let emitter = DiscEmitter {
            rate: config.spawn_rate,
            radius: config.spawn_radius,
            material: config.material,
        };

        log::info!(
            "Engine ready: {}x{} canvas, {} particles, {:.1}s rewind",
            config.width,
            config.height,
            state.particle_count(),
            config.rewind_seconds
        );

        Self {
            simulator: FluidSimulator::new(backend, state),
            history: HistoryBuffer::new(config.rewind_seconds),
            ghost: GhostBranch::new(),
            loop_recorder: LoopRecorder::new(config.loop_duration, config.ghost_speed),
            acceleration: TimeAcceleration::new(config.max_time_acceleration),
            input: InputQueue::new(),
            pointer: PointerState::new(),
            mouse_mode: MouseMode::default(),
            emitter,
            brush: TemperatureBrush::default(),
            material_table,
            material_cache,
            rewinding: false,
            rng: StdRng::from_entropy(),
            ticks: 0,
            config,
        }
    }

    fn environment_from(config: &SimulationConfig) -> Environment {
        Environment {
            width: config.width,
            height: config.height,
            gravity: config.gravity,
            viscosity: config.viscosity,
            repulsion: config.repulsion,
            surface_tension: config.surface_tension,
            min_temperature: thermal::MIN_TEMPERATURE,
            max_temperature: thermal::MAX_TEMPERATURE,
        }
    }

    /// Reseed the spawn generator
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Advance everything by one frame of `dt` seconds
    pub fn tick(&mut self, dt: f32) -> EngineResult<()> {
        let dt = dt.clamp(0.0, self.config.max_delta_time);

        // Step 1: queued input
        for event in self.input.drain() {
            self.handle_event(event)?;
        }

        let environment = Self::environment_from(&self.config);
        let forcing = self.current_forcing();

        // Step 2: canonical timeline
        if self.rewinding {
            self.rewind_step()?;
        } else if self.ghost.is_active() {
            self.ghost.advance(&mut self.simulator, environment, forcing, dt)?;
        } else {
            self.apply_pointer_tools(dt)?;

            let factor = self.acceleration.update(dt);
            let state = self
                .simulator
                .current_state()
                .with_environment(environment)
                .with_forcing(forcing);
            self.simulator.set_state(state);
            self.simulator.update(dt * factor)?;

            let stepped = self.simulator.current_state();
            if stepped.has_particles() {
                self.history.push(Arc::clone(stepped.particles()));
            }
        }

        // Step 3: loop timers
        let particles = Arc::clone(self.simulator.current_state().particles());
        self.loop_recorder.advance(dt, &particles);

        self.ticks += 1;
        Ok(())
    }

    /// Restore the newest history entry; freezes once history runs out
    fn rewind_step(&mut self) -> EngineResult<()> {
        let Some(particles) = self.history.pop() else {
            return Ok(());
        };
        let state = self.simulator.current_state().with_particles(particles);
        self.simulator.set_state(state);
        self.simulator.prepare_backend()?;
        self.simulator.notify_listeners();
        Ok(())
    }

    fn current_forcing(&self) -> Forcing {
        let direction = self.pointer.direction();
        let scale = self.config.mouse_force;
        let (force, mode) = match self.mouse_mode {
            MouseMode::Drawing => (direction * scale, ForceMode::Radial),
            MouseMode::Temperature => (direction * pointer::TEMPERATURE_MULTIPLIER * scale, ForceMode::None),
            MouseMode::Vortex => (direction * pointer::VORTEX_MULTIPLIER * scale, ForceMode::Vortex),
        };
        Forcing {
            pointer: self.pointer.position(),
            force,
            force_scale: scale,
            mode: if force == 0.0 { ForceMode::None } else { mode },
        }
    }

    fn apply_pointer_tools(&mut self, dt: f32) -> EngineResult<()> {
        match self.mouse_mode {
            MouseMode::Drawing if self.pointer.is_pressed(PointerButton::Middle) => {
                self.spawn_at(self.pointer.position())?;
            }
            MouseMode::Temperature if self.pointer.direction() != 0.0 => {
                let heating = self.pointer.is_pressed(PointerButton::Primary);
                let state = self.simulator.current_state();
                let heated = self.brush.apply(state.particles(), self.pointer.position(), heating, dt);
                let state = state.with_particles(Arc::new(heated));
                self.simulator.set_state(state);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_event(&mut self, event: InputEvent) -> EngineResult<()> {
        match event {
            InputEvent::PointerMoved { x, y } => self.pointer.move_to(x, y),
            InputEvent::PointerPressed(button) => self.pointer.set_button(button, true),
            InputEvent::PointerReleased(button) => self.pointer.set_button(button, false),
            InputEvent::SetMouseMode(mode) => {
                if mode != self.mouse_mode {
                    log::info!("Mouse mode: {:?}", mode);
                    self.mouse_mode = mode;
                }
            }
            InputEvent::RewindPressed => {
                if !self.rewinding {
                    log::info!("Rewind started ({} frames available)", self.history.len());
                    self.rewinding = true;
                }
            }
            InputEvent::RewindReleased => {
                if self.rewinding {
                    log::info!("Rewind stopped");
                    self.rewinding = false;
                }
            }
            InputEvent::GhostPressed => {
                if !self.ghost.is_active() {
                    self.ghost.activate(self.simulator.current_state());
                }
            }
            InputEvent::GhostReleased => {
                self.ghost.deactivate();
            }
            InputEvent::AcceleratePressed => self.acceleration.press(),
            InputEvent::AccelerateReleased => self.acceleration.release(),
            InputEvent::LoopStart => {
                let particles = Arc::clone(self.simulator.current_state().particles());
                self.loop_recorder.start_recording(&particles);
            }
            InputEvent::LoopEnd => {
                let particles = Arc::clone(self.simulator.current_state().particles());
                self.loop_recorder.finish_recording(&particles);
            }
            InputEvent::LoopTogglePlayback => {
                self.loop_recorder.toggle_playback();
            }
            InputEvent::LoopCancel => self.loop_recorder.cancel(),
            InputEvent::SpawnAt { x, y } => {
                self.spawn_at(Vec2::new(x, y))?;
            }
            InputEvent::ClearParticles => self.clear_particles()?,
            InputEvent::SetTemperature(temperature) => self.set_temperature(temperature),
            InputEvent::SetMaterial(material) => self.set_material(material),
            InputEvent::Resize { width, height } => self.resize(width, height),
            InputEvent::Parameter(change) => self.apply_parameter(change),
        }
        Ok(())
    }

    /// Add `floor(spawn_rate)` particles around `center`; returns how many
    pub fn spawn_at(&mut self, center: Vec2) -> EngineResult<usize> {
        let state = self.simulator.current_state();
        let spawned = self.emitter.spawn_into(state.particles(), center, &mut self.rng);
        let added = spawned.len() - state.particle_count();
        let state = state.with_particles(Arc::new(spawned));

        self.simulator.set_state(state);
        self.simulator.prepare_backend()?;
        Ok(added)
    }

    /// Remove every particle and forget the rewind history
    pub fn clear_particles(&mut self) -> EngineResult<()> {
        let state = self
            .simulator
            .current_state()
            .with_particles(Arc::new(ParticleSet::empty()));
        self.simulator.set_state(state);
        self.history.clear();
        self.simulator.prepare_backend()?;
        log::info!("Cleared all particles");
        Ok(())
    }

    /// Set every particle's temperature, clamped to the thermal bounds
    pub fn set_temperature(&mut self, temperature: f32) {
        let temperature = temperature.clamp(thermal::MIN_TEMPERATURE, thermal::MAX_TEMPERATURE);
        let state = self.simulator.current_state();
        let particles = state.particles().with_uniform_temperature(temperature);
        let state = state.with_particles(Arc::new(particles));
        self.simulator.set_state(state);
    }

    /// Select the material used for new particles
    pub fn set_material(&mut self, material: Material) {
        self.emitter.material = material;
        log::info!("Spawn material: {}", material);
    }

    /// Override one material's density for every particle using it
    pub fn set_material_density(&mut self, material: Material, density: f32) {
        self.material_table.set_density(material, density);
        let table = self.material_cache.encoded(&self.material_table);
        let state = self.simulator.current_state().with_material_table(table);
        self.simulator.set_state(state);
        self.simulator.set_material_density(material, density);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.config.width = width.max(1.0);
        self.config.height = height.max(1.0);
        log::debug!("Canvas resized to {}x{}", self.config.width, self.config.height);
    }

    pub fn apply_parameter(&mut self, change: ParameterChange) {
        let config = &mut self.config;
        match change {
            ParameterChange::Gravity(v) => config.gravity = ranges::GRAVITY.clamp(v),
            ParameterChange::Viscosity(v) => config.viscosity = ranges::VISCOSITY.clamp(v),
            ParameterChange::Repulsion(v) => config.repulsion = ranges::REPULSION.clamp(v),
            ParameterChange::SurfaceTension(v) => config.surface_tension = ranges::SURFACE_TENSION.clamp(v),
            ParameterChange::MouseForce(v) => config.mouse_force = ranges::MOUSE_FORCE.clamp(v),
            ParameterChange::SpawnRate(v) => {
                config.spawn_rate = ranges::SPAWN_RATE.clamp(v);
                self.emitter.rate = config.spawn_rate;
            }
            ParameterChange::SpawnRadius(v) => {
                config.spawn_radius = ranges::SPAWN_RADIUS.clamp(v);
                self.emitter.radius = config.spawn_radius;
            }
            ParameterChange::RewindSeconds(v) => {
                config.rewind_seconds = ranges::REWIND_SECONDS.clamp(v);
                self.history.set_rewind_seconds(config.rewind_seconds);
            }
            ParameterChange::MaxTimeAcceleration(v) => {
                config.max_time_acceleration = ranges::MAX_TIME_ACCELERATION.clamp(v);
                self.acceleration.set_max_factor(config.max_time_acceleration);
            }
            ParameterChange::LoopDuration(v) => {
                config.loop_duration = ranges::LOOP_DURATION.clamp(v);
                self.loop_recorder.set_loop_duration(config.loop_duration);
            }
            ParameterChange::GhostSpeed(v) => {
                config.ghost_speed = ranges::GHOST_SPEED.clamp(v);
                self.loop_recorder.set_ghost_speed(config.ghost_speed);
            }
        }
    }

    /// Replace the canonical particles, e.g. with a scene built by hand
    pub fn set_particles(&mut self, particles: ParticleSet) -> EngineResult<()> {
        particles.validate()?;
        let state = self.simulator.current_state().with_particles(Arc::new(particles));
        self.simulator.set_state(state);
        self.history.clear();
        self.simulator.prepare_backend()
    }

    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        self.simulator.save_state(path)
    }

    /// Restore a snapshot, or an empty state if it cannot be read
    ///
    /// History and the ghost branch no longer apply and are dropped.
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<()> {
        self.history.clear();
        self.ghost.deactivate();
        self.simulator.load_state(path)
    }

    pub fn push_input(&self, event: InputEvent) {
        self.input.push(event);
    }

    pub fn input_sender(&self) -> InputSender {
        self.input.sender()
    }

    pub fn add_listener(&self, listener: Arc<dyn SimulationListener>) -> ListenerId {
        self.simulator.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.simulator.remove_listener(id)
    }

    pub fn listeners(&self) -> ListenerRegistry {
        self.simulator.listeners()
    }

    pub fn state(&self) -> &SimulationState {
        self.simulator.current_state()
    }

    pub fn simulator(&self) -> &FluidSimulator {
        &self.simulator
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn ghost(&self) -> &GhostBranch {
        &self.ghost
    }

    pub fn loop_recorder(&self) -> &LoopRecorder {
        &self.loop_recorder
    }

    pub fn acceleration(&self) -> &TimeAcceleration {
        &self.acceleration
    }

    pub fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    pub fn spawn_material(&self) -> Material {
        self.emitter.material
    }

    pub fn is_rewinding(&self) -> bool {
        self.rewinding
    }

    /// Canonical stepping is suspended while the ghost branch is active
    pub fn physics_enabled(&self) -> bool {
        !self.ghost.is_active()
    }

    /// Interpolated loop positions while playback is running
    pub fn loop_display_positions(&self) -> Option<Vec<Vec2>> {
        self.loop_recorder.display_positions()
    }

    pub fn backend_lifecycle(&self) -> BackendLifecycle {
        self.simulator.backend_lifecycle()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn close(&mut self) {
        self.simulator.close();
    }
}
