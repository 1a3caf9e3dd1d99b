use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::thermal;
use crate::materials::Material;
use crate::particles::ParticleSet;

/// Spawns particles uniformly inside a disc around the pointer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscEmitter {
    /// Particles per tick; the fractional part is dropped
    pub rate: f32,
    /// Disc radius in pixels
    pub radius: f32,
    pub material: Material,
}

impl Default for DiscEmitter {
    fn default() -> Self {
        Self {
            rate: 5.0,
            radius: 10.0,
            material: Material::Water,
        }
    }
}

impl DiscEmitter {
    /// Particles emitted per tick
    pub fn count(&self) -> usize {
        self.rate.max(0.0) as usize
    }

    /// New particles at rest around `center`
    pub fn emit<R: Rng + ?Sized>(&self, center: Vec2, count: usize, rng: &mut R) -> ParticleSet {
        let positions: Vec<Vec2> = (0..count)
            .map(|_| {
                let angle = rng.gen::<f32>() * TAU;
                let radius = rng.gen::<f32>() * self.radius;
                center + Vec2::new(angle.cos(), angle.sin()) * radius
            })
            .collect();

        let spawned = ParticleSet::at_rest(&positions, self.material);
        debug_assert!(spawned.temperatures().iter().all(|&t| t == thermal::INITIAL_TEMPERATURE));
        spawned
    }

    /// `particles` followed by one tick's worth of new particles
    pub fn spawn_into<R: Rng + ?Sized>(&self, particles: &ParticleSet, center: Vec2, rng: &mut R) -> ParticleSet {
        particles.concat(&self.emit(center, self.count(), rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn zero_radius_spawns_on_the_point() {
        let emitter = DiscEmitter {
            rate: 5.0,
            radius: 0.0,
            material: Material::Glycerin,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let set = emitter.spawn_into(&ParticleSet::empty(), Vec2::new(100.0, 100.0), &mut rng);

        assert_eq!(set.len(), 5);
        for i in 0..set.len() {
            assert_eq!(set.position(i), Vec2::new(100.0, 100.0));
            assert_eq!(set.velocity(i), Vec2::ZERO);
            assert_eq!(set.colors()[i], Material::Glycerin.color());
        }
    }

    #[test]
    fn spawned_particles_stay_inside_disc() {
        let emitter = DiscEmitter {
            rate: 200.0,
            radius: 25.0,
            material: Material::Water,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let center = Vec2::new(300.0, 200.0);
        let set = emitter.emit(center, emitter.count(), &mut rng);

        assert_eq!(set.len(), 200);
        assert!(set.positions().iter().all(|p| p.distance(center) <= 25.0 + 1e-3));
    }

    #[test]
    fn fractional_rate_is_floored() {
        let emitter = DiscEmitter {
            rate: 3.9,
            ..DiscEmitter::default()
        };
        assert_eq!(emitter.count(), 3);
    }
}
