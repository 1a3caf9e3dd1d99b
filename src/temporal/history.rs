use std::collections::VecDeque;
use std::sync::Arc;

use crate::constants::timing;
use crate::particles::ParticleSet;

/// Bounded store of past particle sets for rewind
///
/// Newest entries are at the back. Pushing past capacity evicts from the
/// front; `pop` takes from the back.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<Arc<ParticleSet>>,
    capacity: usize,
    rewind_seconds: f32,
}

impl HistoryBuffer {
    pub fn new(rewind_seconds: f32) -> Self {
        let capacity = Self::capacity_for(rewind_seconds);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            rewind_seconds,
        }
    }

    /// Frames kept for `rewind_seconds` of history
    pub fn capacity_for(rewind_seconds: f32) -> usize {
        (rewind_seconds.max(0.0) * timing::HISTORY_FRAME_RATE as f32).floor() as usize
    }

    pub fn push(&mut self, snapshot: Arc<ParticleSet>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Newest entry
    pub fn pop(&mut self) -> Option<Arc<ParticleSet>> {
        self.entries.pop_back()
    }

    pub fn newest(&self) -> Option<&Arc<ParticleSet>> {
        self.entries.back()
    }

    /// Change the rewind window, evicting the oldest entries beyond it
    pub fn set_rewind_seconds(&mut self, rewind_seconds: f32) {
        self.rewind_seconds = rewind_seconds;
        self.capacity = Self::capacity_for(rewind_seconds);
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.entries.drain(..excess);
            log::debug!("History shrunk to {} frames, evicted {}", self.capacity, excess);
        }
    }

    pub fn rewind_seconds(&self) -> f32 {
        self.rewind_seconds
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Material;
    use glam::Vec2;

    fn frame(x: f32) -> Arc<ParticleSet> {
        Arc::new(ParticleSet::at_rest(&[Vec2::new(x, 0.0)], Material::Water))
    }

    #[test]
    fn capacity_is_sixty_frames_per_second() {
        assert_eq!(HistoryBuffer::new(5.0).capacity(), 300);
        assert_eq!(HistoryBuffer::new(0.5).capacity(), 30);
        assert_eq!(HistoryBuffer::new(0.0).capacity(), 0);
    }

    #[test]
    fn push_evicts_oldest_past_capacity() {
        let mut history = HistoryBuffer::new(0.25); // 15 frames
        for i in 0..20 {
            history.push(frame(i as f32));
        }
        assert_eq!(history.len(), 15);
        assert_eq!(history.pop().unwrap().position(0).x, 19.0);
        assert_eq!(history.pop().unwrap().position(0).x, 18.0);
        for _ in 0..13 {
            assert!(history.pop().is_some());
        }
        assert!(history.pop().is_none());
    }

    #[test]
    fn shrinking_evicts_immediately() {
        let mut history = HistoryBuffer::new(1.0);
        for i in 0..60 {
            history.push(frame(i as f32));
        }
        history.set_rewind_seconds(0.5);
        assert_eq!(history.len(), 30);
        // Oldest went first
        assert_eq!(history.newest().unwrap().position(0).x, 59.0);
    }

    #[test]
    fn zero_window_stores_nothing() {
        let mut history = HistoryBuffer::new(0.0);
        history.push(frame(1.0));
        assert!(history.is_empty());
    }
}
