use glam::Vec2;

use crate::constants::{pointer, thermal};
use crate::particles::ParticleSet;

/// Pointer tool that heats or cools particles near the cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBrush {
    pub radius: f32,
    /// Degrees per second at the brush center
    pub rate: f32,
    pub min_temperature: f32,
    pub max_temperature: f32,
}

impl Default for TemperatureBrush {
    fn default() -> Self {
        Self {
            radius: pointer::INFLUENCE_RADIUS,
            rate: pointer::TEMPERATURE_CHANGE_RATE,
            min_temperature: thermal::MIN_TEMPERATURE,
            max_temperature: thermal::MAX_TEMPERATURE,
        }
    }
}

impl TemperatureBrush {
    /// Apply one tick of heating (`heating = true`) or cooling
    ///
    /// Change falls off linearly to zero at the brush radius.
    pub fn apply(&self, particles: &ParticleSet, center: Vec2, heating: bool, dt: f32) -> ParticleSet {
        let sign = if heating { 1.0 } else { -1.0 };
        let radius_sq = self.radius * self.radius;

        let temperatures = particles
            .temperatures()
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let dist_sq = particles.position(i).distance_squared(center);
                if dist_sq < radius_sq {
                    let factor = 1.0 - dist_sq.sqrt() / self.radius;
                    (t + sign * self.rate * factor * dt).clamp(self.min_temperature, self.max_temperature)
                } else {
                    t
                }
            })
            .collect();

        // One output per input temperature, so the counts always agree
        particles
            .with_temperatures(temperatures)
            .unwrap_or_else(|_| particles.clone())
    }
}
