//! Particle storage and pointer tools that create or modify particles

pub mod emitter;
pub mod particle_set;
pub mod thermal;

pub use emitter::DiscEmitter;
pub use particle_set::{Particle, ParticleSet, KINEMATIC_STRIDE};
pub use thermal::TemperatureBrush;
