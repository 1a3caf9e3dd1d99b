use glam::Vec2;

use crate::constants::timing;
use crate::particles::ParticleSet;

/// Loop recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    /// Start points captured, waiting for the end
    Recording,
    /// Both endpoints captured, not playing
    Armed,
    Playing,
}

/// Captures start and end snapshots and replays the interpolation between them
///
/// Playback output is display-only; it never feeds the simulation.
#[derive(Debug, Clone)]
pub struct LoopRecorder {
    phase: LoopPhase,
    start_points: Option<Vec<Vec2>>,
    end_points: Option<Vec<Vec2>>,
    timer: f32,
    loop_duration: f32,
    ghost_speed: f32,
}

impl LoopRecorder {
    pub fn new(loop_duration: f32, ghost_speed: f32) -> Self {
        Self {
            phase: LoopPhase::Idle,
            start_points: None,
            end_points: None,
            timer: 0.0,
            loop_duration,
            ghost_speed,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn loop_duration(&self) -> f32 {
        self.loop_duration
    }

    pub fn set_loop_duration(&mut self, loop_duration: f32) {
        self.loop_duration = loop_duration;
    }

    pub fn set_ghost_speed(&mut self, ghost_speed: f32) {
        self.ghost_speed = ghost_speed;
    }

    pub fn start_points(&self) -> Option<&[Vec2]> {
        self.start_points.as_deref()
    }

    pub fn end_points(&self) -> Option<&[Vec2]> {
        self.end_points.as_deref()
    }

    /// Capture start points; refused while playing
    ///
    /// Starting again while recording or armed discards the previous capture.
    pub fn start_recording(&mut self, particles: &ParticleSet) -> bool {
        if self.phase == LoopPhase::Playing {
            log::debug!("Loop recording ignored during playback");
            return false;
        }
        self.start_points = Some(particles.positions());
        self.end_points = None;
        self.timer = 0.0;
        self.phase = LoopPhase::Recording;
        log::info!("Loop recording started with {} particles", particles.len());
        true
    }

    /// Capture end points and arm playback
    pub fn finish_recording(&mut self, particles: &ParticleSet) -> bool {
        if self.phase != LoopPhase::Recording {
            return false;
        }
        self.end_points = Some(particles.positions());
        self.timer = 0.0;
        self.phase = LoopPhase::Armed;
        log::info!("Loop recorded, {} particles at end", particles.len());
        true
    }

    /// Switch between armed and playing
    pub fn toggle_playback(&mut self) -> bool {
        if self.start_points.is_none() || self.end_points.is_none() {
            return false;
        }
        match self.phase {
            LoopPhase::Armed => {
                self.timer = 0.0;
                self.phase = LoopPhase::Playing;
                log::info!("Loop playback started");
                true
            }
            LoopPhase::Playing => {
                self.phase = LoopPhase::Armed;
                log::info!("Loop playback stopped");
                true
            }
            _ => false,
        }
    }

    /// Drop everything and return to idle
    pub fn cancel(&mut self) {
        if self.phase != LoopPhase::Idle {
            log::info!("Loop cancelled");
        }
        self.phase = LoopPhase::Idle;
        self.start_points = None;
        self.end_points = None;
        self.timer = 0.0;
    }

    /// Advance the recording or playback timer
    ///
    /// A recording that reaches the loop duration finishes with `particles`
    /// as its end points.
    pub fn advance(&mut self, dt: f32, particles: &ParticleSet) {
        match self.phase {
            LoopPhase::Recording => {
                self.timer += dt;
                if self.timer >= self.loop_duration {
                    self.finish_recording(particles);
                }
            }
            LoopPhase::Playing => {
                self.timer = if self.loop_duration > 0.0 {
                    (self.timer + dt) % self.loop_duration
                } else {
                    0.0
                };
            }
            LoopPhase::Idle | LoopPhase::Armed => {}
        }
    }

    /// Interpolation weight for a playback time
    pub fn ghost_factor(&self, timer: f32) -> f32 {
        if self.loop_duration <= 0.0 {
            return 1.0;
        }
        let progress = timer / self.loop_duration;
        if progress < timing::LOOP_PROGRESS_CLAMP {
            progress * self.ghost_speed
        } else {
            1.0
        }
    }

    /// Interpolated positions at `timer`, if both endpoints exist
    ///
    /// Endpoint sets of different sizes are matched up to the shorter one.
    pub fn positions_at(&self, timer: f32) -> Option<Vec<Vec2>> {
        let start = self.start_points.as_ref()?;
        let end = self.end_points.as_ref()?;
        let ghost = self.ghost_factor(timer);
        Some(
            start
                .iter()
                .zip(end)
                .map(|(&s, &e)| s + (e - s) * ghost)
                .collect(),
        )
    }

    /// Positions to draw this frame; only while playing
    pub fn display_positions(&self) -> Option<Vec<Vec2>> {
        if self.phase != LoopPhase::Playing {
            return None;
        }
        self.positions_at(self.timer)
    }
}
