//! Input events and pointer state
//!
//! UI threads push [`InputEvent`]s into an [`InputQueue`]; the engine drains
//! the queue once at the start of every tick, so mode toggles never race a
//! step in progress.

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::materials::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// What the pointer buttons do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseMode {
    /// Pull / push, middle button spawns
    #[default]
    Drawing,
    /// Heat / cool
    Temperature,
    /// Swirl either way
    Vortex,
}

/// Slider-style parameter updates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterChange {
    Gravity(f32),
    Viscosity(f32),
    Repulsion(f32),
    SurfaceTension(f32),
    MouseForce(f32),
    SpawnRate(f32),
    SpawnRadius(f32),
    RewindSeconds(f32),
    MaxTimeAcceleration(f32),
    LoopDuration(f32),
    GhostSpeed(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32 },
    PointerPressed(PointerButton),
    PointerReleased(PointerButton),
    SetMouseMode(MouseMode),
    RewindPressed,
    RewindReleased,
    GhostPressed,
    GhostReleased,
    AcceleratePressed,
    AccelerateReleased,
    LoopStart,
    LoopEnd,
    LoopTogglePlayback,
    LoopCancel,
    SpawnAt { x: f32, y: f32 },
    ClearParticles,
    SetTemperature(f32),
    SetMaterial(Material),
    Resize { width: f32, height: f32 },
    Parameter(ParameterChange),
}

/// Cloneable handle for pushing events from any thread
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

impl InputSender {
    /// Returns false once the engine is gone
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[derive(Debug)]
pub struct InputQueue {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> InputSender {
        InputSender { tx: self.tx.clone() }
    }

    pub fn push(&self, event: InputEvent) {
        // The queue owns a receiver, so sending cannot fail
        let _ = self.tx.send(event);
    }

    /// Everything queued so far, in arrival order
    pub fn drain(&self) -> Vec<InputEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Pointer position and held buttons
#[derive(Debug, Clone, Default)]
pub struct PointerState {
    position: Vec2,
    primary: bool,
    secondary: bool,
    middle: bool,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn set_button(&mut self, button: PointerButton, pressed: bool) {
        match button {
            PointerButton::Primary => self.primary = pressed,
            PointerButton::Secondary => self.secondary = pressed,
            PointerButton::Middle => self.middle = pressed,
        }
    }

    pub fn is_pressed(&self, button: PointerButton) -> bool {
        match button {
            PointerButton::Primary => self.primary,
            PointerButton::Secondary => self.secondary,
            PointerButton::Middle => self.middle,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// -1 for primary, +1 for secondary, 0 for neither or both
    pub fn direction(&self) -> f32 {
        match (self.primary, self.secondary) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_across_senders() {
        let queue = InputQueue::new();
        let sender = queue.sender();
        queue.push(InputEvent::RewindPressed);
        assert!(sender.send(InputEvent::RewindReleased));

        let handle = std::thread::spawn(move || sender.send(InputEvent::LoopStart));
        assert!(handle.join().unwrap());

        assert_eq!(
            queue.drain(),
            vec![
                InputEvent::RewindPressed,
                InputEvent::RewindReleased,
                InputEvent::LoopStart
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn sender_reports_closed_queue() {
        let queue = InputQueue::new();
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.send(InputEvent::ClearParticles));
    }

    #[test]
    fn pointer_direction_follows_buttons() {
        let mut pointer = PointerState::new();
        assert_eq!(pointer.direction(), 0.0);
        pointer.set_button(PointerButton::Primary, true);
        assert_eq!(pointer.direction(), -1.0);
        pointer.set_button(PointerButton::Secondary, true);
        assert_eq!(pointer.direction(), 0.0);
        pointer.set_button(PointerButton::Primary, false);
        assert_eq!(pointer.direction(), 1.0);
    }
}
