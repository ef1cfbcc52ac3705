//! Agent traits and types

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Action, Observation, Transition};

/// Configuration for agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Multiplicative exploration decay applied once per episode
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Capacity of the experience log
    pub buffer_size: usize,
    /// Random seed for exploration; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            buffer_size: 10_000,
            seed: None,
        }
    }
}

/// Core agent trait
pub trait Agent: Send {
    /// Select an action given an observation
    fn act(&mut self, observation: &Observation) -> Action;

    /// Apply one learning update from a transition
    fn learn(&mut self, transition: &Transition);

    /// Retain a transition for later use
    fn remember(&mut self, _transition: Transition) {}

    /// Hook invoked once after every completed episode
    fn end_episode(&mut self) {}

    /// Save the agent
    fn save(&self, path: &Path) -> crate::Result<()>;

    /// Load the agent; on error the in-memory state is left untouched
    fn load(&mut self, path: &Path) -> crate::Result<()>;

    /// Get agent metrics
    fn metrics(&self) -> AgentMetrics {
        AgentMetrics::default()
    }
}

/// Agent metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Total learning updates applied
    pub total_updates: u64,
    /// Current exploration rate
    pub exploration_rate: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of materialized states
    pub table_size: usize,
}
