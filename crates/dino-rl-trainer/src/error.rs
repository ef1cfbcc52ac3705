//! Error types for training orchestration

use thiserror::Error;

use dino_rl_core::RLError;

/// Orchestration errors
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("training is already running")]
    AlreadyRunning,

    #[error("training is not running")]
    NotRunning,

    #[error("episode count must be greater than zero")]
    InvalidEpisodes,

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] RLError),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for TrainerError {
    fn from(err: tokio::task::JoinError) -> Self {
        TrainerError::Worker(err.to_string())
    }
}

/// Result type alias for orchestration
pub type Result<T> = std::result::Result<T, TrainerError>;
