//! Exploration schedule

use serde::{Deserialize, Serialize};

/// Multiplicative exploration decay with a floor.
///
/// Decays once per call to [`ExplorationSchedule::step`], never increases,
/// and never drops below `min_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    /// Current value
    value: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl ExplorationSchedule {
    /// Create a new schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            value: start.clamp(0.0, 1.0),
            min_value,
            decay_rate,
        }
    }

    /// Current exploration rate
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply one decay step and return the new value
    pub fn step(&mut self) -> f64 {
        let next = (self.value * self.decay_rate).max(self.min_value);
        self.value = next.min(self.value);
        self.value
    }

    /// Overwrite the current value, clamped to `[0, 1]`
    pub fn set(&mut self, value: f64) {
        self.value = value.clamp(0.0, 1.0);
    }
}
