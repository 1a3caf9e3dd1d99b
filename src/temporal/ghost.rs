use std::sync::Arc;

use crate::error::EngineResult;
use crate::particles::ParticleSet;
use crate::simulator::FluidSimulator;
use crate::state::{Environment, Forcing, SimulationState};

/// Isolated preview branch
///
/// Holds its own copy of the particles taken at activation and advances it
/// through the simulator's backend. Nothing flows back into the canonical
/// state or the history.
#[derive(Debug, Default)]
pub struct GhostBranch {
    state: Option<SimulationState>,
}

impl GhostBranch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `state`'s particles into the branch; replaces an active branch
    pub fn activate(&mut self, state: &SimulationState) {
        let copy = ParticleSet::clone(state.particles());
        log::info!("Ghost branch activated with {} particles", copy.len());
        self.state = Some(state.with_particles(Arc::new(copy)));
    }

    /// Drop the branch; returns false if it was not active
    pub fn deactivate(&mut self) -> bool {
        let was_active = self.state.take().is_some();
        if was_active {
            log::info!("Ghost branch released");
        }
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Step the branch once with the current environment and forcing
    pub fn advance(
        &mut self,
        simulator: &mut FluidSimulator,
        environment: Environment,
        forcing: Forcing,
        dt: f32,
    ) -> EngineResult<()> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };
        let input = state.with_environment(environment).with_forcing(forcing);
        self.state = Some(simulator.advance_detached(&input, dt)?);
        Ok(())
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn particles(&self) -> Option<&Arc<ParticleSet>> {
        self.state.as_ref().map(SimulationState::particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::materials::Material;

    #[test]
    fn ghost_copy_is_independent() {
        let env = Environment {
            width: 300.0,
            height: 300.0,
            gravity: 500.0,
            ..Environment::default()
        };
        let state = SimulationState::default()
            .with_environment(env)
            .with_particles(Arc::new(ParticleSet::grid(300.0, 300.0, Material::Water)));
        let mut sim = FluidSimulator::new(Box::new(CpuBackend::new()), state.clone());

        let mut ghost = GhostBranch::new();
        ghost.activate(sim.current_state());
        assert!(!Arc::ptr_eq(ghost.particles().unwrap(), state.particles()));

        for _ in 0..3 {
            ghost.advance(&mut sim, env, Forcing::default(), 0.016).unwrap();
        }
        assert_ne!(ghost.particles().unwrap().kinematics(), state.particles().kinematics());
        assert_eq!(sim.current_state(), &state);

        assert!(ghost.deactivate());
        assert!(!ghost.deactivate());
        assert!(ghost.particles().is_none());
    }
}
