//! Simulation environments for Dino Arena
//!
//! This crate provides the dino runner simulator, the wrappers the trainer
//! composes around it, and the conversion from live browser game state into
//! the simulator's observation encoding.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dino;
pub mod game_state;
pub mod wrappers;

// Re-export environments
pub use dino::{DinoConfig, DinoEnv, Obstacle, ObstacleKind, Rect, RewardConfig};
pub use game_state::{DinoSnapshot, GameSnapshot, ObstacleSnapshot};
pub use wrappers::TimeLimit;

// Re-export core types
pub use dino_rl_core::{Action, ActionSpace, Environment, EnvironmentConfig, Observation, Reward, Step};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DinoConfig, DinoEnv, GameSnapshot, TimeLimit};
    pub use dino_rl_core::prelude::*;
}
