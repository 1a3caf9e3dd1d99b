//! Immutable per-frame simulation state
//!
//! A [`SimulationState`] is built once and never mutated. Each frame produces
//! a new value through the `with_*` methods, which share unchanged parts via
//! `Arc`.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::thermal;
use crate::materials::MaterialTable;
use crate::particles::ParticleSet;

/// Canvas and global physics scalars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub width: f32,
    pub height: f32,
    /// Downward acceleration in pixels per second squared
    pub gravity: f32,
    pub viscosity: f32,
    pub repulsion: f32,
    pub surface_tension: f32,
    pub min_temperature: f32,
    pub max_temperature: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            gravity: 0.0,
            viscosity: 0.0,
            repulsion: 0.0,
            surface_tension: 0.0,
            min_temperature: thermal::MIN_TEMPERATURE,
            max_temperature: thermal::MAX_TEMPERATURE,
        }
    }
}

/// How the pointer force is applied
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ForceMode {
    #[default]
    None = 0,
    /// Push away (positive) or pull toward (negative) the pointer
    Radial = 1,
    /// Swirl around the pointer; sign picks the direction
    Vortex = 2,
}

/// External forcing for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Forcing {
    pub pointer: Vec2,
    /// Signed force currently applied
    pub force: f32,
    /// Configured force magnitude
    pub force_scale: f32,
    pub mode: ForceMode,
}

impl Forcing {
    pub fn is_active(&self) -> bool {
        self.mode != ForceMode::None && self.force != 0.0
    }
}

/// Snapshot of everything the backend needs for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    particles: Arc<ParticleSet>,
    material_table: Arc<[f32]>,
    environment: Environment,
    forcing: Forcing,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            particles: Arc::new(ParticleSet::empty()),
            material_table: Arc::from(MaterialTable::new().encode()),
            environment: Environment::default(),
            forcing: Forcing::default(),
        }
    }
}

impl SimulationState {
    pub fn new(
        particles: Arc<ParticleSet>,
        material_table: Arc<[f32]>,
        environment: Environment,
        forcing: Forcing,
    ) -> Self {
        Self {
            particles,
            material_table,
            environment,
            forcing,
        }
    }

    /// Copy of this state with replaced particles
    pub fn with_particles(&self, particles: Arc<ParticleSet>) -> Self {
        Self {
            particles,
            ..self.clone()
        }
    }

    pub fn with_environment(&self, environment: Environment) -> Self {
        Self {
            environment,
            ..self.clone()
        }
    }

    pub fn with_forcing(&self, forcing: Forcing) -> Self {
        Self {
            forcing,
            ..self.clone()
        }
    }

    pub fn with_material_table(&self, material_table: Arc<[f32]>) -> Self {
        Self {
            material_table,
            ..self.clone()
        }
    }

    pub fn has_particles(&self) -> bool {
        !self.particles.is_empty()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &Arc<ParticleSet> {
        &self.particles
    }

    pub fn material_table(&self) -> &Arc<[f32]> {
        &self.material_table
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn forcing(&self) -> &Forcing {
        &self.forcing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Material;

    #[test]
    fn default_state_is_empty() {
        let state = SimulationState::default();
        assert!(!state.has_particles());
        assert_eq!(state.particle_count(), 0);
    }

    #[test]
    fn with_particles_leaves_original_untouched() {
        let original = SimulationState::default();
        let particles = Arc::new(ParticleSet::at_rest(&[Vec2::new(1.0, 1.0)], Material::Water));
        let next = original.with_particles(Arc::clone(&particles));

        assert!(!original.has_particles());
        assert!(next.has_particles());
        assert!(Arc::ptr_eq(next.material_table(), original.material_table()));
        assert!(Arc::ptr_eq(next.particles(), &particles));
    }

    #[test]
    fn forcing_needs_mode_and_force() {
        let mut forcing = Forcing {
            force: 10.0,
            ..Forcing::default()
        };
        assert!(!forcing.is_active());
        forcing.mode = ForceMode::Radial;
        assert!(forcing.is_active());
        forcing.force = 0.0;
        assert!(!forcing.is_active());
    }
}
