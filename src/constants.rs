// Fluid Engine Constants - SINGLE SOURCE OF TRUTH
//
// Both the host backend and the WGSL kernels read these values (the kernels
// through the params uniform). Slider ranges live in `config`.

/// Neighbor search and force pass
pub mod kernel {
    /// Radius within which particles interact
    pub const INTERACTION_RADIUS: f32 = 40.0;

    /// Spatial hash cell edge, equal to the interaction radius so a 3x3 cell
    /// block always covers a full neighborhood
    pub const CELL_SIZE: f32 = INTERACTION_RADIUS;

    /// Neighbors stored per particle; the rest are dropped
    pub const MAX_NEIGHBORS: usize = 64;

    /// Compute workgroup size used by every WGSL entry point
    pub const WORKGROUP_SIZE: u32 = 256;

    /// Speed clamp applied after integration (pixels per second)
    pub const MAX_SPEED: f32 = 3000.0;

    /// Distance below which two particles count as coincident
    pub const MIN_SEPARATION: f32 = 1.0e-4;
}

/// Pointer interaction
pub mod pointer {
    /// Distance at which pointer force falls to half strength
    pub const INFLUENCE_RADIUS: f32 = 100.0;

    /// Force multiplier for the temperature tool
    pub const TEMPERATURE_MULTIPLIER: f32 = 2.5;

    /// Force multiplier for the vortex tool, also the clamp on |force|
    pub const VORTEX_MULTIPLIER: f32 = 4.5;

    /// Degrees per second applied by the temperature brush
    pub const TEMPERATURE_CHANGE_RATE: f32 = 50.0;
}

/// Thermal model
pub mod thermal {
    pub const INITIAL_TEMPERATURE: f32 = 20.0;
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 100.0;

    /// Fraction of the weighted neighbor temperature difference applied per step
    pub const TEMPERATURE_DIFFUSION: f32 = 0.1;
}

/// Timing
pub mod timing {
    /// Frame rate used to size the rewind history
    pub const HISTORY_FRAME_RATE: u32 = 60;

    /// Default rate of the fixed tick driver
    pub const DRIVER_TICK_RATE: u32 = 120;

    /// Time acceleration ramp (factor per second while held)
    pub const ACCELERATION_RATE: f32 = 2.0;

    /// Loop playback clamps to full progress past this point
    pub const LOOP_PROGRESS_CLAMP: f32 = 0.99;
}

/// Initial particle layout
pub mod layout {
    pub const PARTICLE_SPACING: f32 = 15.0;
    pub const SCREEN_MARGIN: f32 = 50.0;
}
