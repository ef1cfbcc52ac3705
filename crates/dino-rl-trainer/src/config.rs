//! Trainer configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dino_rl_core::{AgentConfig, EnvironmentConfig};
use dino_rl_env::DinoConfig;

use crate::error::{Result, TrainerError};

/// Trainer configuration, loadable from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Directory holding the model and summary files
    pub checkpoint_dir: PathBuf,
    /// Episodes between status notifications
    pub status_interval: usize,
    /// Episodes between checkpoints
    pub checkpoint_interval: usize,
    /// Step ceiling per episode
    pub max_steps_per_episode: usize,
    /// How long `stop` waits for the worker
    pub stop_timeout_ms: u64,
    /// Number of recent episodes in the rolling average
    pub history_window: usize,
    /// Buffered notifications per subscriber
    pub notification_capacity: usize,
    /// Control server bind address
    pub bind_address: IpAddr,
    /// Control server port
    pub port: u16,
    pub agent: AgentConfig,
    pub environment: EnvironmentConfig,
    pub game: DinoConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            status_interval: 5,
            checkpoint_interval: 50,
            max_steps_per_episode: 10_000,
            stop_timeout_ms: 5_000,
            history_window: 100,
            notification_capacity: 256,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8765,
            agent: AgentConfig::default(),
            environment: EnvironmentConfig::default(),
            game: DinoConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Read a TOML file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrainerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TrainerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the trainer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_steps_per_episode == 0 {
            return Err(TrainerError::Config("max_steps_per_episode must be positive".into()));
        }
        if self.history_window == 0 {
            return Err(TrainerError::Config("history_window must be positive".into()));
        }
        if self.notification_capacity == 0 {
            return Err(TrainerError::Config("notification_capacity must be positive".into()));
        }
        let agent = &self.agent;
        if !(0.0..=1.0).contains(&agent.gamma) || !(agent.learning_rate > 0.0 && agent.learning_rate <= 1.0) {
            return Err(TrainerError::Config("learning_rate must be in (0, 1] and gamma in [0, 1]".into()));
        }
        Ok(())
    }

    /// How long `stop` waits for the worker
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Control server socket address
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TrainerConfig::from_toml(
            r#"
            checkpoint_dir = "/tmp/dino"
            port = 9000

            [agent]
            learning_rate = 0.1
            seed = 42

            [environment]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.checkpoint_dir, PathBuf::from("/tmp/dino"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.agent.learning_rate, 0.1);
        assert_eq!(config.agent.gamma, 0.95);
        assert_eq!(config.agent.seed, Some(42));
        assert_eq!(config.environment.seed, Some(7));
        assert_eq!(config.status_interval, 5);
        assert_eq!(config.game.max_score, 5000.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(TrainerConfig::from_toml("max_steps_per_episode = 0").is_err());
        assert!(TrainerConfig::from_toml("[agent]\nlearning_rate = 0.0").is_err());
        assert!(TrainerConfig::from_toml("status_interval = \"five\"").is_err());
    }

    #[test]
    fn test_step_ceiling_lives_on_trainer() {
        // The environment section has no ceiling of its own
        assert!(TrainerConfig::from_toml("[environment]\nmax_steps = 500").is_err());

        let config = TrainerConfig::from_toml("max_steps_per_episode = 500").unwrap();
        assert_eq!(config.max_steps_per_episode, 500);
    }
}
