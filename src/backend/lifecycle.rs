use crate::error::{EngineError, EngineResult};
use crate::materials::{Material, MATERIAL_SLOT_WIDTH};

/// Observable backend lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendLifecycle {
    Uninitialized,
    Ready { particle_count: usize },
    Closed,
}

/// Buffers owned by a backend, tagged by lifecycle
///
/// Steps are only possible in `Ready`, and only with the count the buffers
/// were allocated for.
#[derive(Debug)]
pub enum BufferState<B> {
    Uninitialized,
    Ready { particle_count: usize, buffers: B },
    Closed,
}

impl<B> BufferState<B> {
    pub fn lifecycle(&self) -> BackendLifecycle {
        match self {
            BufferState::Uninitialized => BackendLifecycle::Uninitialized,
            BufferState::Ready { particle_count, .. } => BackendLifecycle::Ready {
                particle_count: *particle_count,
            },
            BufferState::Closed => BackendLifecycle::Closed,
        }
    }

    pub fn is_ready_for(&self, count: usize) -> bool {
        matches!(self, BufferState::Ready { particle_count, .. } if *particle_count == count)
    }

    /// Buffers for a step over `requested` particles
    pub fn ready_mut(&mut self, requested: usize) -> EngineResult<&mut B> {
        match self {
            BufferState::Ready { particle_count, buffers } if *particle_count == requested => Ok(buffers),
            BufferState::Ready { particle_count, .. } => Err(EngineError::BufferSizeMismatch {
                prepared: *particle_count,
                requested,
            }),
            BufferState::Uninitialized => Err(EngineError::BufferSizeMismatch {
                prepared: 0,
                requested,
            }),
            BufferState::Closed => Err(EngineError::BackendClosed),
        }
    }

    /// Prepared count, if any
    pub fn particle_count(&self) -> Option<usize> {
        match self {
            BufferState::Ready { particle_count, .. } => Some(*particle_count),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, BufferState::Closed)
    }
}

/// Per-material density overrides applied on top of the state's table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DensityOverrides {
    densities: [Option<f32>; Material::COUNT],
}

impl DensityOverrides {
    pub fn set(&mut self, material: Material, density: f32) {
        self.densities[material.index() as usize] = Some(density);
    }

    pub fn is_empty(&self) -> bool {
        self.densities.iter().all(Option::is_none)
    }

    /// Write the effective table into `out`
    pub fn apply(&self, table: &[f32], out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(table);
        for (slot, density) in self.densities.iter().enumerate() {
            if let Some(density) = density {
                if let Some(value) = out.get_mut(slot * MATERIAL_SLOT_WIDTH) {
                    *value = *density;
                }
            }
        }
    }
}
