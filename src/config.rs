//! Engine configuration
//!
//! Every tunable has a default and a slider range. Files are TOML; any field
//! may be omitted. `clamped` pulls out-of-range values back into their range.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::constants::timing;
use crate::error::{EngineError, EngineResult};
use crate::materials::Material;

/// Inclusive slider range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

pub mod ranges {
    use super::ParamRange;

    pub const MOUSE_FORCE: ParamRange = ParamRange::new(100.0, 2000.0);
    pub const VISCOSITY: ParamRange = ParamRange::new(0.0, 2.0);
    pub const REPULSION: ParamRange = ParamRange::new(500.0, 5000.0);
    pub const SURFACE_TENSION: ParamRange = ParamRange::new(0.0, 200.0);
    pub const SPAWN_RATE: ParamRange = ParamRange::new(1.0, 20.0);
    pub const SPAWN_RADIUS: ParamRange = ParamRange::new(0.0, 50.0);
    pub const REWIND_SECONDS: ParamRange = ParamRange::new(0.0, 10.0);
    pub const GRAVITY: ParamRange = ParamRange::new(0.0, 2000.0);
    pub const MAX_TIME_ACCELERATION: ParamRange = ParamRange::new(1.0, 20.0);
    pub const LOOP_DURATION: ParamRange = ParamRange::new(0.5, 30.0);
    pub const GHOST_SPEED: ParamRange = ParamRange::new(0.1, 2.0);
    pub const MAX_DELTA_TIME: ParamRange = ParamRange::new(0.001, 0.1);
    pub const TICK_RATE: ParamRange = ParamRange::new(1.0, 1000.0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: f32,
    pub height: f32,
    pub gravity: f32,
    pub viscosity: f32,
    pub repulsion: f32,
    pub surface_tension: f32,
    pub mouse_force: f32,
    pub spawn_rate: f32,
    pub spawn_radius: f32,
    pub rewind_seconds: f32,
    pub max_time_acceleration: f32,
    pub loop_duration: f32,
    pub ghost_speed: f32,
    /// Upper bound on a single step's delta time
    pub max_delta_time: f32,
    pub tick_rate: u32,
    pub material: Material,
    pub backend: BackendKind,
    /// Load kernels from here instead of the embedded copies
    pub kernel_dir: Option<PathBuf>,
    /// Snapshot to start from
    pub snapshot: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            gravity: 500.0,
            viscosity: 0.8,
            repulsion: 1000.0,
            surface_tension: 100.0,
            mouse_force: 500.0,
            spawn_rate: 5.0,
            spawn_radius: 10.0,
            rewind_seconds: 5.0,
            max_time_acceleration: 10.0,
            loop_duration: 5.0,
            ghost_speed: 0.75,
            max_delta_time: 1.0 / 30.0,
            tick_rate: timing::DRIVER_TICK_RATE,
            material: Material::Water,
            backend: BackendKind::Gpu,
            kernel_dir: None,
            snapshot: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Copy with every ranged value pulled into its range
    pub fn clamped(&self) -> Self {
        let tick_rate = ranges::TICK_RATE.clamp(self.tick_rate as f32) as u32;
        Self {
            width: self.width.max(1.0),
            height: self.height.max(1.0),
            gravity: ranges::GRAVITY.clamp(self.gravity),
            viscosity: ranges::VISCOSITY.clamp(self.viscosity),
            repulsion: ranges::REPULSION.clamp(self.repulsion),
            surface_tension: ranges::SURFACE_TENSION.clamp(self.surface_tension),
            mouse_force: ranges::MOUSE_FORCE.clamp(self.mouse_force),
            spawn_rate: ranges::SPAWN_RATE.clamp(self.spawn_rate),
            spawn_radius: ranges::SPAWN_RADIUS.clamp(self.spawn_radius),
            rewind_seconds: ranges::REWIND_SECONDS.clamp(self.rewind_seconds),
            max_time_acceleration: ranges::MAX_TIME_ACCELERATION.clamp(self.max_time_acceleration),
            loop_duration: ranges::LOOP_DURATION.clamp(self.loop_duration),
            ghost_speed: ranges::GHOST_SPEED.clamp(self.ghost_speed),
            max_delta_time: ranges::MAX_DELTA_TIME.clamp(self.max_delta_time),
            tick_rate,
            ..self.clone()
        }
    }
}
