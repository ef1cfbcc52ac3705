//! Bounded experience log

use std::collections::VecDeque;

use dino_rl_core::Transition;

/// FIFO log of recent transitions; the oldest entry is evicted at capacity
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    /// Buffer storage
    buffer: VecDeque<Transition>,
    /// Maximum capacity
    capacity: usize,
}

impl ExperienceBuffer {
    /// Create a new experience buffer
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Add a transition to the buffer
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Get the current size of the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of retained transitions
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transitions from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dino_rl_core::{Action, Observation};

    fn transition(reward: f64) -> Transition {
        Transition::new(Observation::zeros(), Action::None, reward, Observation::zeros(), false)
    }

    #[test]
    fn test_fifo_eviction() {
        let mut buffer = ExperienceBuffer::new(3);
        for i in 0..5 {
            buffer.push(transition(f64::from(i)));
        }
        assert_eq!(buffer.len(), 3);
        let rewards: Vec<f64> = buffer.iter().map(|t| t.reward.0).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut buffer = ExperienceBuffer::new(0);
        buffer.push(transition(1.0));
        assert!(buffer.is_empty());
    }
}
