//! Environment traits and types

use serde::{Deserialize, Serialize};

use crate::{Action, Observation, Reward};

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the step
    pub observation: Observation,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode reached a terminal state
    pub done: bool,
    /// Whether the episode was cut short (e.g., step ceiling)
    pub truncated: bool,
}

impl Step {
    /// Whether the episode is over for any reason
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.done || self.truncated
    }
}

/// Configuration for environments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Random seed; `None` draws one from the OS
    pub seed: Option<u64>,
}

/// Core environment trait.
///
/// Implementations advance in discrete ticks and never block.
pub trait Environment: Send {
    /// Reset the environment and return the initial observation
    fn reset(&mut self) -> Observation;

    /// Advance the environment by one tick
    fn step(&mut self, action: Action) -> Step;

    /// Current episode score
    fn score(&self) -> f64;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn reset(&mut self) -> Observation {
        (**self).reset()
    }

    fn step(&mut self, action: Action) -> Step {
        (**self).step(action)
    }

    fn score(&self) -> f64 {
        (**self).score()
    }
}
