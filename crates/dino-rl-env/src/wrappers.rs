//! Environment wrappers for common transformations

use dino_rl_core::{Action, Environment, Observation, Step};

/// Time limit wrapper.
///
/// Marks the step that reaches the ceiling as truncated. The inner `done`
/// flag is left alone so a cut-off episode is not mistaken for a terminal
/// state when bootstrapping.
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: usize,
    /// Current step count
    pub steps: usize,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }
}

impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    fn reset(&mut self) -> Observation {
        self.steps = 0;
        self.env.reset()
    }

    fn step(&mut self, action: Action) -> Step {
        self.steps += 1;
        let mut step = self.env.step(action);

        if self.steps >= self.max_steps && !step.done {
            step.truncated = true;
        }

        step
    }

    fn score(&self) -> f64 {
        self.env.score()
    }
}
