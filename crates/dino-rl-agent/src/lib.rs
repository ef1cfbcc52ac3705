//! Tabular reinforcement learning agents for Dino Arena
//!
//! This crate provides the observation discretizer, the sparse action-value
//! table, and the epsilon-greedy Q-learning agent built on them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod discretize;
pub mod q_learning;
pub mod q_table;
pub mod utils;

// Re-export agents
pub use q_learning::{AgentSnapshot, QLearningAgent};

// Re-export utilities
pub use buffer::ExperienceBuffer;
pub use discretize::{discretize, DiscreteKey};
pub use q_table::{ActionValues, QTable};
pub use utils::ExplorationSchedule;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{discretize, DiscreteKey, ExperienceBuffer, QLearningAgent, QTable};
    pub use dino_rl_core::prelude::*;
}
