//! Training orchestration and live control for Dino Arena
//!
//! The [`Trainer`] runs Q-learning episodes against the dino simulator on a
//! blocking worker, keeps statistics, checkpoints learned state, and serves
//! greedy actions. The [`ControlServer`] exposes it over WebSocket and REST.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod stats;

pub use bridge::{Command, ControlServer, Reply};
pub use checkpoint::{Checkpoint, CheckpointStore, TrainingSummary, MODEL_FILE, SUMMARY_FILE};
pub use config::TrainerConfig;
pub use error::{Result, TrainerError};
pub use notify::{LogEntry, Notification, Notifier};
pub use orchestrator::{EvaluationReport, Phase, StopReport, Trainer};
pub use stats::{EpisodeStats, StatusSnapshot, TrainingStats};
