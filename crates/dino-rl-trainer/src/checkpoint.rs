//! Checkpoint persistence: compressed model file plus a JSON summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use dino_rl_agent::AgentSnapshot;
use dino_rl_core::{persist, RLError, Result};

use crate::stats::TrainingStats;

/// File name of the compressed model
pub const MODEL_FILE: &str = "dino_q_model.bin.gz";
/// File name of the JSON summary
pub const SUMMARY_FILE: &str = "training_stats.json";

/// Learned state plus training history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub agent: AgentSnapshot,
    pub episode_rewards: Vec<f64>,
    pub episode_scores: Vec<f64>,
    pub total_episodes: usize,
    pub best_score: f64,
    pub training_seconds: f64,
    pub generation: u64,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Capture the agent and the statistics as one checkpoint
    #[must_use]
    pub fn capture(agent: AgentSnapshot, stats: &TrainingStats) -> Self {
        Self {
            agent,
            episode_rewards: stats.episode_rewards.clone(),
            episode_scores: stats.episode_scores.clone(),
            total_episodes: stats.total_episodes,
            best_score: stats.best_score,
            training_seconds: stats.training_seconds,
            generation: stats.generation,
            saved_at: Utc::now(),
        }
    }

    /// Human-readable summary written next to the model
    #[must_use]
    pub fn summary(&self, average_score: f64) -> TrainingSummary {
        TrainingSummary {
            episodes: self.total_episodes,
            best_score: self.best_score,
            average_score,
            training_time: self.training_seconds,
            generation: self.generation,
            saved_at: self.saved_at,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.episode_scores.len() != self.episode_rewards.len() {
            return Err(RLError::Checkpoint(format!(
                "history length mismatch: {} scores, {} rewards",
                self.episode_scores.len(),
                self.episode_rewards.len()
            )));
        }
        if !self.best_score.is_finite() || !self.training_seconds.is_finite() {
            return Err(RLError::Checkpoint("non-finite metadata".into()));
        }
        Ok(())
    }

    /// Rebuild trainer statistics from this checkpoint
    #[must_use]
    pub fn to_stats(&self, history_window: usize) -> TrainingStats {
        let mut stats = TrainingStats::new(history_window, self.agent.exploration_rate);
        stats.total_episodes = self.total_episodes;
        stats.best_score = self.best_score;
        stats.episode_rewards = self.episode_rewards.clone();
        stats.episode_scores = self.episode_scores.clone();
        stats.training_seconds = self.training_seconds;
        stats.generation = self.generation;
        stats
    }
}

/// Contents of the JSON summary file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub best_score: f64,
    pub average_score: f64,
    /// Cumulative training time in seconds
    pub training_time: f64,
    pub generation: u64,
    pub saved_at: DateTime<Utc>,
}

/// Reads and writes checkpoints in one directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Write both files. Both are fully staged before either is renamed, so
    /// an encoding or disk failure leaves the previous pair in place.
    pub fn save(&self, checkpoint: &Checkpoint, summary: &TrainingSummary) -> Result<()> {
        let model = persist::encode_compressed(checkpoint)?;
        let summary_json = serde_json::to_vec_pretty(summary)?;

        let model = persist::stage(&self.model_path(), &model)?;
        let summary_file = persist::stage(&self.summary_path(), &summary_json)?;
        model.commit()?;
        summary_file.commit()?;

        info!(
            generation = checkpoint.generation,
            episodes = checkpoint.total_episodes,
            states = checkpoint.agent.table.len(),
            "Checkpoint saved to {}",
            self.dir.display()
        );
        Ok(())
    }

    /// Load the checkpoint, if any.
    ///
    /// A missing model is `Ok(None)`. A summary whose generation differs from
    /// the model's is ignored.
    pub fn load(&self) -> Result<Option<(Checkpoint, Option<TrainingSummary>)>> {
        let model_path = self.model_path();
        if !model_path.exists() {
            debug!("No checkpoint at {}", model_path.display());
            return Ok(None);
        }

        let bytes = std::fs::read(&model_path)?;
        let checkpoint: Checkpoint = persist::decode_compressed(&bytes)
            .map_err(|e| RLError::Checkpoint(format!("{}: {e}", model_path.display())))?;
        checkpoint.validate()?;

        let summary = match self.read_summary() {
            Ok(summary) if summary.generation == checkpoint.generation => Some(summary),
            Ok(summary) => {
                warn!(
                    model = checkpoint.generation,
                    summary = summary.generation,
                    "Ignoring summary from a different checkpoint generation"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable training summary");
                None
            }
        };

        Ok(Some((checkpoint, summary)))
    }

    fn read_summary(&self) -> Result<TrainingSummary> {
        let text = std::fs::read(self.summary_path())?;
        Ok(serde_json::from_slice(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dino_rl_agent::{DiscreteKey, QTable};

    fn checkpoint(generation: u64) -> Checkpoint {
        let mut table = QTable::new();
        table.row_mut(DiscreteKey([1, 0, 0, 0, 5, 0, 1, 1, 0]))[1] = 0.25;
        table.row_mut(DiscreteKey([0; 9]))[0] = -1.5;

        let mut stats = TrainingStats::new(100, 0.3);
        stats.record(12.5, 40.0, 125, false, 0.3, 1.0);
        stats.record(3.0, -80.0, 30, false, 0.3, 1.0);
        stats.generation = generation;

        Checkpoint::capture(
            AgentSnapshot {
                table,
                exploration_rate: 0.3,
                total_updates: 155,
            },
            &stats,
        )
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let saved = checkpoint(3);
        store.save(&saved, &saved.summary(7.75)).unwrap();

        let (loaded, summary) = store.load().unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.agent.table.iter().count(), 2);
        let summary = summary.unwrap();
        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.average_score, 7.75);
    }

    #[test]
    fn test_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("never-created"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_model_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.model_path(), b"not a checkpoint").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_stale_summary_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let old = checkpoint(1);
        store.save(&old, &old.summary(0.0)).unwrap();

        let new = checkpoint(2);
        persist::write_atomic(&store.model_path(), &persist::encode_compressed(&new).unwrap()).unwrap();

        let (loaded, summary) = store.load().unwrap().unwrap();
        assert_eq!(loaded.generation, 2);
        assert!(summary.is_none());
    }

    #[test]
    fn test_to_stats_restores_history() {
        let saved = checkpoint(4);
        let stats = saved.to_stats(100);
        assert_eq!(stats.total_episodes, 2);
        assert_eq!(stats.episode, 0);
        assert_eq!(stats.average_score(), 7.75);
        assert_eq!(stats.exploration_rate, 0.3);
    }
}
