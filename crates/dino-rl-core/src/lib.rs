//! Core reinforcement learning traits and types for Dino Arena
//!
//! This crate provides the shared vocabulary of the workspace: actions,
//! observations, rewards, transitions, and the environment and agent traits
//! the trainer drives.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod agent;
pub mod environment;
pub mod error;
pub mod observation;
pub mod persist;
pub mod reward;
pub mod trajectory;

// Re-export core traits and types
pub use action::{Action, ActionSpace};
pub use agent::{Agent, AgentConfig, AgentMetrics};
pub use environment::{Environment, EnvironmentConfig, Step};
pub use error::{RLError, Result};
pub use observation::{Observation, OBSERVATION_DIM};
pub use reward::Reward;
pub use trajectory::Transition;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionSpace, Agent, AgentConfig, Environment, Observation, Result, Reward,
        Step, Transition,
    };
}
