//! Tabular Q-learning agent

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use dino_rl_core::persist;
use dino_rl_core::{Action, ActionSpace, Agent, AgentConfig, AgentMetrics, Observation, RLError, Result, Transition};

use crate::buffer::ExperienceBuffer;
use crate::discretize::discretize;
use crate::q_table::{ActionValues, QTable};
use crate::utils::ExplorationSchedule;

/// Learned state of a [`QLearningAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Action-value table
    pub table: QTable,
    /// Exploration rate at snapshot time
    pub exploration_rate: f64,
    /// Learning updates applied so far
    pub total_updates: u64,
}

/// Epsilon-greedy tabular Q-learning
pub struct QLearningAgent {
    config: AgentConfig,
    /// Shared with readers through [`QLearningAgent::policy`]; writes copy on
    /// demand when a reader still holds the previous table
    table: Arc<QTable>,
    exploration: ExplorationSchedule,
    memory: ExperienceBuffer,
    action_space: ActionSpace,
    rng: StdRng,
    total_updates: u64,
}

impl QLearningAgent {
    /// Create a new agent with an empty table
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            table: Arc::new(QTable::new()),
            exploration: ExplorationSchedule::new(
                config.epsilon_start,
                config.epsilon_min,
                config.epsilon_decay,
            ),
            memory: ExperienceBuffer::new(config.buffer_size),
            action_space: ActionSpace,
            rng,
            total_updates: 0,
            config,
        }
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Greedy action, as if the exploration rate were zero
    #[must_use]
    pub fn greedy_action(&self, observation: &Observation) -> Action {
        self.table.best_action(&discretize(observation))
    }

    /// Action values at the observation's key
    #[must_use]
    pub fn q_values(&self, observation: &Observation) -> ActionValues {
        self.table.get(&discretize(observation))
    }

    /// Decay the exploration rate once
    pub fn decay_exploration(&mut self) -> f64 {
        self.exploration.step()
    }

    /// Current exploration rate
    #[must_use]
    pub fn exploration_rate(&self) -> f64 {
        self.exploration.value()
    }

    /// Read-only view of the current table
    #[must_use]
    pub fn policy(&self) -> Arc<QTable> {
        Arc::clone(&self.table)
    }

    /// Current table
    #[must_use]
    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Retained transitions
    #[must_use]
    pub fn memory(&self) -> &ExperienceBuffer {
        &self.memory
    }

    /// Forget every learned value
    pub fn reset_table(&mut self) {
        self.table = Arc::new(QTable::new());
        self.total_updates = 0;
    }

    /// Capture the learned state
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            table: (*self.table).clone(),
            exploration_rate: self.exploration.value(),
            total_updates: self.total_updates,
        }
    }

    /// Replace the learned state; nothing changes if the snapshot is invalid
    pub fn restore(&mut self, snapshot: AgentSnapshot) -> Result<()> {
        if !(0.0..=1.0).contains(&snapshot.exploration_rate) {
            return Err(RLError::Agent(format!(
                "exploration rate {} out of range",
                snapshot.exploration_rate
            )));
        }
        if let Some((key, _)) = snapshot
            .table
            .iter()
            .find(|(_, row)| row.iter().any(|v| !v.is_finite()))
        {
            return Err(RLError::Agent(format!("non-finite value at {key:?}")));
        }

        self.table = Arc::new(snapshot.table);
        self.exploration.set(snapshot.exploration_rate);
        self.total_updates = snapshot.total_updates;
        Ok(())
    }
}

impl Agent for QLearningAgent {
    fn act(&mut self, observation: &Observation) -> Action {
        if self.rng.gen::<f64>() < self.exploration.value() {
            self.action_space.sample(&mut self.rng)
        } else {
            self.greedy_action(observation)
        }
    }

    fn learn(&mut self, transition: &Transition) {
        let state = discretize(&transition.state);
        let next_state = discretize(&transition.next_state);
        let table = Arc::make_mut(&mut self.table);

        table.row_mut(next_state);
        let target = if transition.done {
            transition.reward.0
        } else {
            transition.reward.0 + self.config.gamma * table.max_value(&next_state)
        };

        let entry = &mut table.row_mut(state)[transition.action.index()];
        *entry += self.config.learning_rate * (target - *entry);
        self.total_updates += 1;
    }

    fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    fn end_episode(&mut self) {
        let epsilon = self.decay_exploration();
        debug!(epsilon, states = self.table.len(), "Exploration decayed");
    }

    fn save(&self, path: &Path) -> Result<()> {
        let bytes = persist::encode_compressed(&self.snapshot())?;
        persist::write_atomic(path, &bytes)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let snapshot: AgentSnapshot = persist::decode_compressed(&bytes)?;
        self.restore(snapshot)
    }

    fn metrics(&self) -> AgentMetrics {
        AgentMetrics {
            total_updates: self.total_updates,
            exploration_rate: self.exploration.value(),
            learning_rate: self.config.learning_rate,
            table_size: self.table.len(),
        }
    }
}
