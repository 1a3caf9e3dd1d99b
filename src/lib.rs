//! Interactive 2D particle fluid simulation engine
//!
//! Particles are advanced each frame by a compute backend (wgpu or a
//! rayon-parallel host fallback) under short-range pairwise forces, gravity,
//! temperature diffusion and pointer forces. Around the simulator sit the
//! temporal controls: bounded rewind history, a ghost preview branch, loop
//! capture and playback, and time acceleration.

pub mod backend;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod input;
pub mod materials;
pub mod particles;
pub mod persistence;
pub mod simulator;
pub mod spatial_hash;
pub mod state;
pub mod temporal;

pub use backend::{BackendKind, BackendLifecycle, ComputeBackend, CpuBackend, GpuBackend, KernelSource};
pub use config::SimulationConfig;
pub use engine::{DriverHandle, Engine, FixedRateDriver};
pub use error::{EngineError, EngineResult};
pub use input::{InputEvent, InputQueue, InputSender, MouseMode, ParameterChange, PointerButton};
pub use materials::{Material, MaterialProperties, MaterialTable};
pub use particles::{Particle, ParticleSet};
pub use simulator::{FluidSimulator, ListenerId, ListenerRegistry, SimPhase, SimulationListener};
pub use spatial_hash::{CellGrid, SpatialHash};
pub use state::{Environment, ForceMode, Forcing, SimulationState};
pub use temporal::{GhostBranch, HistoryBuffer, LoopPhase, LoopRecorder, TimeAcceleration};
