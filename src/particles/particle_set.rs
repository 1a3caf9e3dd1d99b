use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::{layout, thermal};
use crate::error::{EngineError, EngineResult};
use crate::materials::Material;

/// Floats per particle in the kinematics array: x, y, vx, vy
pub const KINEMATIC_STRIDE: usize = 4;

/// One particle read out of a [`ParticleSet`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub temperature: f32,
    pub material: u32,
    pub color: u32,
}

/// Particle data with parallel per-particle arrays
///
/// Kinematics are interleaved `[x, y, vx, vy]` so the backends can move them
/// as one buffer. Every array always holds the same particle count; the count
/// only changes by building a new set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleSet {
    kinematics: Vec<f32>,
    temperatures: Vec<f32>,
    materials: Vec<u32>,
    colors: Vec<u32>,
}

impl ParticleSet {
    /// Build a set, checking that all arrays agree on the particle count
    pub fn new(
        kinematics: Vec<f32>,
        temperatures: Vec<f32>,
        materials: Vec<u32>,
        colors: Vec<u32>,
    ) -> EngineResult<Self> {
        let set = Self {
            kinematics,
            temperatures,
            materials,
            colors,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Regular grid filling the canvas inside the screen margin
    pub fn grid(width: f32, height: f32, material: Material) -> Self {
        let margin = layout::SCREEN_MARGIN;
        let spacing = layout::PARTICLE_SPACING;
        let cols = ((width - 2.0 * margin) / spacing).max(0.0) as usize;
        let rows = ((height - 2.0 * margin) / spacing).max(0.0) as usize;

        let positions: Vec<Vec2> = (0..rows)
            .flat_map(|row| {
                (0..cols).map(move |col| {
                    Vec2::new(margin + col as f32 * spacing, margin + row as f32 * spacing)
                })
            })
            .collect();

        Self::at_rest(&positions, material)
    }

    /// Particles at rest at the given positions, initial temperature
    pub fn at_rest(positions: &[Vec2], material: Material) -> Self {
        let n = positions.len();
        Self {
            kinematics: positions.iter().flat_map(|p| [p.x, p.y, 0.0, 0.0]).collect(),
            temperatures: vec![thermal::INITIAL_TEMPERATURE; n],
            materials: vec![material.index(); n],
            colors: vec![material.color(); n],
        }
    }

    /// Check the equal-count invariant
    pub fn validate(&self) -> EngineResult<()> {
        if self.kinematics.len() % KINEMATIC_STRIDE != 0 {
            return Err(EngineError::ParticleCountMismatch {
                field: "kinematics",
                expected: self.kinematics.len() / KINEMATIC_STRIDE * KINEMATIC_STRIDE,
                found: self.kinematics.len(),
            });
        }
        let expected = self.kinematics.len() / KINEMATIC_STRIDE;
        for (field, found) in [
            ("temperatures", self.temperatures.len()),
            ("materials", self.materials.len()),
            ("colors", self.colors.len()),
        ] {
            if found != expected {
                return Err(EngineError::ParticleCountMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }

    pub fn kinematics(&self) -> &[f32] {
        &self.kinematics
    }

    pub fn temperatures(&self) -> &[f32] {
        &self.temperatures
    }

    pub fn materials(&self) -> &[u32] {
        &self.materials
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn position(&self, index: usize) -> Vec2 {
        let base = index * KINEMATIC_STRIDE;
        Vec2::new(self.kinematics[base], self.kinematics[base + 1])
    }

    pub fn velocity(&self, index: usize) -> Vec2 {
        let base = index * KINEMATIC_STRIDE;
        Vec2::new(self.kinematics[base + 2], self.kinematics[base + 3])
    }

    pub fn particle(&self, index: usize) -> Option<Particle> {
        if index >= self.len() {
            return None;
        }
        Some(Particle {
            position: self.position(index),
            velocity: self.velocity(index),
            temperature: self.temperatures[index],
            material: self.materials[index],
            color: self.colors[index],
        })
    }

    /// Snapshot of every position
    pub fn positions(&self) -> Vec<Vec2> {
        self.kinematics
            .chunks_exact(KINEMATIC_STRIDE)
            .map(|p| Vec2::new(p[0], p[1]))
            .collect()
    }

    /// Same particles with new kinematics and temperatures from a backend step
    pub fn with_dynamics(&self, kinematics: Vec<f32>, temperatures: Vec<f32>) -> EngineResult<Self> {
        Self::new(kinematics, temperatures, self.materials.clone(), self.colors.clone())
    }

    /// Same particles with every temperature set to `temperature`
    pub fn with_uniform_temperature(&self, temperature: f32) -> Self {
        Self {
            temperatures: vec![temperature; self.len()],
            ..self.clone()
        }
    }

    /// Same particles with replaced temperatures
    pub fn with_temperatures(&self, temperatures: Vec<f32>) -> EngineResult<Self> {
        Self::new(
            self.kinematics.clone(),
            temperatures,
            self.materials.clone(),
            self.colors.clone(),
        )
    }

    /// A new set holding these particles followed by `other`
    pub fn concat(&self, other: &ParticleSet) -> Self {
        let mut kinematics = Vec::with_capacity(self.kinematics.len() + other.kinematics.len());
        kinematics.extend_from_slice(&self.kinematics);
        kinematics.extend_from_slice(&other.kinematics);

        let mut temperatures = Vec::with_capacity(self.len() + other.len());
        temperatures.extend_from_slice(&self.temperatures);
        temperatures.extend_from_slice(&other.temperatures);

        let mut materials = Vec::with_capacity(self.len() + other.len());
        materials.extend_from_slice(&self.materials);
        materials.extend_from_slice(&other.materials);

        let mut colors = Vec::with_capacity(self.len() + other.len());
        colors.extend_from_slice(&self.colors);
        colors.extend_from_slice(&other.colors);

        Self {
            kinematics,
            temperatures,
            materials,
            colors,
        }
    }
}
