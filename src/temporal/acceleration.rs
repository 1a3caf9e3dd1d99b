use crate::constants::timing;

/// Ramping time multiplier while the accelerate control is held
#[derive(Debug, Clone)]
pub struct TimeAcceleration {
    factor: f32,
    max_factor: f32,
    held: bool,
}

impl TimeAcceleration {
    pub fn new(max_factor: f32) -> Self {
        Self {
            factor: 1.0,
            max_factor: max_factor.max(1.0),
            held: false,
        }
    }

    pub fn press(&mut self) {
        self.held = true;
    }

    /// Stop accelerating and snap back to real time
    pub fn release(&mut self) {
        self.held = false;
        self.factor = 1.0;
    }

    /// Advance the ramp by `dt` and return the current factor
    pub fn update(&mut self, dt: f32) -> f32 {
        if self.held {
            self.factor = (self.factor + timing::ACCELERATION_RATE * dt).min(self.max_factor);
        }
        self.factor
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn set_max_factor(&mut self, max_factor: f32) {
        self.max_factor = max_factor.max(1.0);
        self.factor = self.factor.min(self.max_factor);
    }
}
