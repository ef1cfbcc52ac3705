//! Episode and run statistics

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Episode index within the current run, starting at 1
    pub episode: usize,
    /// Score when the episode ended
    pub score: f64,
    /// Sum of rewards
    pub total_reward: f64,
    pub steps: usize,
    /// Ended by the step ceiling or a stop request
    pub truncated: bool,
    /// Best score over all recorded episodes
    pub best_score: f64,
    /// Mean score over the most recent episodes
    pub average_score: f64,
}

/// Status view served to clients.
///
/// Field names on the wire follow the browser client (`is_training`,
/// `epsilon`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "is_training")]
    pub running: bool,
    /// Episodes finished in the current or most recent run
    pub episode: usize,
    pub best_score: f64,
    pub average_score: f64,
    #[serde(rename = "epsilon")]
    pub exploration_rate: f64,
    pub learning_rate: f64,
    /// Episodes finished across all runs, including restored ones
    pub total_episodes: usize,
    pub run_id: Option<Uuid>,
}

/// Statistics owned by the trainer
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStats {
    pub episode: usize,
    pub total_episodes: usize,
    pub best_score: f64,
    pub episode_rewards: Vec<f64>,
    pub episode_scores: Vec<f64>,
    pub training_seconds: f64,
    pub exploration_rate: f64,
    /// Bumped on every saved checkpoint
    pub generation: u64,
    pub run_id: Option<Uuid>,
    pub last_episode: Option<EpisodeStats>,
    history_window: usize,
}

impl TrainingStats {
    pub fn new(history_window: usize, exploration_rate: f64) -> Self {
        Self {
            episode: 0,
            total_episodes: 0,
            best_score: 0.0,
            episode_rewards: Vec::new(),
            episode_scores: Vec::new(),
            training_seconds: 0.0,
            exploration_rate,
            generation: 0,
            run_id: None,
            last_episode: None,
            history_window: history_window.max(1),
        }
    }

    /// Reset the per-run counters
    pub fn begin_run(&mut self, run_id: Uuid) {
        self.run_id = Some(run_id);
        self.episode = 0;
        self.last_episode = None;
    }

    /// Mean of the most recent scores; 0 before any episode
    #[must_use]
    pub fn average_score(&self) -> f64 {
        let start = self.episode_scores.len().saturating_sub(self.history_window);
        let recent = &self.episode_scores[start..];
        if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        }
    }

    /// Apply one finished episode
    pub fn record(
        &mut self,
        score: f64,
        total_reward: f64,
        steps: usize,
        truncated: bool,
        exploration_rate: f64,
        elapsed_seconds: f64,
    ) -> EpisodeStats {
        self.episode += 1;
        self.total_episodes += 1;
        self.episode_scores.push(score);
        self.episode_rewards.push(total_reward);
        self.best_score = self.best_score.max(score);
        self.exploration_rate = exploration_rate;
        self.training_seconds += elapsed_seconds;

        let stats = EpisodeStats {
            episode: self.episode,
            score,
            total_reward,
            steps,
            truncated,
            best_score: self.best_score,
            average_score: self.average_score(),
        };
        self.last_episode = Some(stats.clone());
        stats
    }

    #[must_use]
    pub fn snapshot(&self, running: bool, learning_rate: f64) -> StatusSnapshot {
        StatusSnapshot {
            running,
            episode: self.episode,
            best_score: self.best_score,
            average_score: self.average_score(),
            exploration_rate: self.exploration_rate,
            learning_rate,
            total_episodes: self.total_episodes,
            run_id: self.run_id,
        }
    }
}
