//! Transitions and experience storage types

use serde::{Deserialize, Serialize};

use crate::{Action, Observation, Reward};

/// Single transition produced by one environment tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation the action was chosen from
    pub state: Observation,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: Reward,
    /// Observation after the tick
    pub next_state: Observation,
    /// Whether the tick ended the episode (collision or score cap)
    pub done: bool,
}

impl Transition {
    /// Create a new transition
    #[must_use]
    pub fn new(
        state: Observation,
        action: Action,
        reward: impl Into<Reward>,
        next_state: Observation,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward: reward.into(),
            next_state,
            done,
        }
    }
}
