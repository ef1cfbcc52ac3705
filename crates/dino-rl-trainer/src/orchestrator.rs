//! Training orchestrator
//!
//! Drives environment/agent interaction on a blocking worker while the
//! control surface starts, stops and queries it from async tasks. The worker
//! and the control surface share only:
//!
//! - the run phase, an atomic polled once per tick,
//! - the statistics behind an async `RwLock`, written once per episode,
//! - the published policy, a `watch` channel of copy-on-write tables,
//! - the agent slot, locked only when a run starts or ends,
//! - the notification channel.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dino_rl_agent::{discretize, AgentSnapshot, QLearningAgent, QTable};
use dino_rl_core::{Action, Agent, AgentConfig, Environment, Observation, Reward, Transition};
use dino_rl_env::{DinoEnv, GameSnapshot, TimeLimit};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::TrainerConfig;
use crate::error::{Result, TrainerError};
use crate::notify::{Notification, Notifier};
use crate::stats::{StatusSnapshot, TrainingStats};

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Running,
            2 => Phase::Stopping,
            _ => Phase::Idle,
        }
    }
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReport {
    /// Whether the worker had returned to idle before the wait ran out
    pub worker_exited: bool,
    /// Episodes finished in the stopped run
    pub episodes_completed: usize,
}

/// Greedy evaluation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub episodes: usize,
    pub scores: Vec<f64>,
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
}

impl EvaluationReport {
    fn from_scores(scores: Vec<f64>) -> Self {
        let episodes = scores.len();
        let average_score = if episodes == 0 {
            0.0
        } else {
            scores.iter().sum::<f64>() / episodes as f64
        };
        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
        Self {
            episodes,
            scores,
            average_score,
            max_score,
            min_score,
        }
    }
}

struct Shared {
    config: TrainerConfig,
    phase: AtomicU8,
    stats: RwLock<TrainingStats>,
    agent: Mutex<Option<QLearningAgent>>,
    policy: watch::Sender<Arc<QTable>>,
    notifier: Notifier,
    store: CheckpointStore,
    worker: Mutex<Option<JoinHandle<()>>>,
    checkpoint_loaded: AtomicBool,
}

impl Shared {
    fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn snapshot(&self, stats: &TrainingStats) -> StatusSnapshot {
        stats.snapshot(self.phase() != Phase::Idle, self.config.agent.learning_rate)
    }
}

/// Handle to the training orchestrator; clones share one trainer
#[derive(Clone)]
pub struct Trainer {
    shared: Arc<Shared>,
}

impl Trainer {
    /// Create a trainer, resuming from the checkpoint directory when it holds
    /// a readable checkpoint
    pub fn new(config: TrainerConfig) -> Self {
        Self::build(config, true)
    }

    /// Create a trainer that ignores any existing checkpoint
    pub fn new_fresh(config: TrainerConfig) -> Self {
        Self::build(config, false)
    }

    fn build(config: TrainerConfig, resume: bool) -> Self {
        let store = CheckpointStore::new(&config.checkpoint_dir);
        let mut agent = QLearningAgent::new(config.agent.clone());
        let mut stats = TrainingStats::new(config.history_window, agent.exploration_rate());
        let mut loaded = false;

        if resume {
            match restore(&store, &mut agent, config.history_window) {
                Ok(Some(restored)) => {
                    info!(
                        episodes = restored.total_episodes,
                        best_score = restored.best_score,
                        states = agent.table().len(),
                        "Resumed from checkpoint"
                    );
                    stats = restored;
                    loaded = true;
                }
                Ok(None) => info!("No checkpoint found, starting fresh"),
                Err(e) => warn!(error = %e, "Failed to load checkpoint, starting fresh"),
            }
        }

        let (policy, _) = watch::channel(agent.policy());
        Self {
            shared: Arc::new(Shared {
                phase: AtomicU8::new(Phase::Idle as u8),
                stats: RwLock::new(stats),
                agent: Mutex::new(Some(agent)),
                policy,
                notifier: Notifier::new(config.notification_capacity),
                store,
                worker: Mutex::new(None),
                checkpoint_loaded: AtomicBool::new(loaded),
                config,
            }),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.shared.config
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    pub fn is_running(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Whether learned state was restored from disk
    pub fn checkpoint_loaded(&self) -> bool {
        self.shared.checkpoint_loaded.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.shared.notifier.subscribe()
    }

    /// Receiver that observes every newly published policy
    pub fn policy_updates(&self) -> watch::Receiver<Arc<QTable>> {
        self.shared.policy.subscribe()
    }

    pub async fn status(&self) -> StatusSnapshot {
        let stats = self.shared.stats.read().await;
        self.shared.snapshot(&stats)
    }

    /// Begin a run of `episodes` episodes on a blocking worker
    pub async fn start(&self, episodes: usize) -> Result<Uuid> {
        if episodes == 0 {
            return Err(TrainerError::InvalidEpisodes);
        }

        let shared = &self.shared;
        if shared
            .phase
            .compare_exchange(
                Phase::Idle as u8,
                Phase::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!("Start rejected, training already running");
            shared.notifier.log("Training is already running");
            return Err(TrainerError::AlreadyRunning);
        }

        let Some(agent) = shared.agent.lock().await.take() else {
            shared.set_phase(Phase::Idle);
            return Err(TrainerError::Worker("agent unavailable".into()));
        };

        let run_id = Uuid::new_v4();
        let snapshot = {
            let mut stats = shared.stats.write().await;
            stats.begin_run(run_id);
            shared.snapshot(&stats)
        };
        info!(%run_id, episodes, "Training started");
        shared
            .notifier
            .log(format!("Training started, target episodes: {episodes}"));
        shared.notifier.status(snapshot);

        let handle = tokio::spawn(supervise(Arc::clone(shared), agent, episodes));
        *shared.worker.lock().await = Some(handle);

        Ok(run_id)
    }

    /// Request a cooperative stop and wait, up to the configured timeout, for
    /// the worker to finish its current tick
    pub async fn stop(&self) -> Result<StopReport> {
        let shared = &self.shared;
        match shared.phase.compare_exchange(
            Phase::Running as u8,
            Phase::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!("Stop requested");
                shared.notifier.log("Stopping training");
            }
            Err(current) if Phase::from_u8(current) == Phase::Stopping => {}
            Err(_) => {
                warn!("Stop rejected, training is not running");
                return Err(TrainerError::NotRunning);
            }
        }

        let worker_exited = self.wait_idle(shared.config.stop_timeout()).await;
        if !worker_exited {
            warn!(
                timeout_ms = shared.config.stop_timeout_ms,
                "Worker still running after stop timeout"
            );
        }

        let episodes_completed = shared.stats.read().await.episode;
        Ok(StopReport {
            worker_exited,
            episodes_completed,
        })
    }

    async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.phase() != Phase::Idle {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Wait for the current run, if any, to finish. Safe to cancel.
    pub async fn join(&self) {
        while self.phase() != Phase::Idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let handle = self.shared.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Training supervisor failed");
            }
        }
    }

    /// Stop any run and wait for the worker without a deadline
    pub async fn shutdown(&self) {
        if self.phase() == Phase::Running {
            // NotRunning here only means the run finished on its own
            let _ = self.stop().await;
        }
        self.join().await;
        info!("Trainer shut down");
    }

    /// Greedy action under the latest published policy
    pub fn query_action(&self, observation: &Observation) -> Action {
        let policy = Arc::clone(&self.shared.policy.borrow());
        policy.best_action(&discretize(observation))
    }

    /// Greedy action for a live browser game state
    pub fn query_action_for_game(&self, snapshot: &GameSnapshot) -> Action {
        self.query_action(&snapshot.to_observation(&self.shared.config.game))
    }

    /// Play `episodes` greedy episodes against the latest published policy
    /// without learning
    pub async fn evaluate(&self, episodes: usize) -> Result<EvaluationReport> {
        if episodes == 0 {
            return Err(TrainerError::InvalidEpisodes);
        }
        let policy = Arc::clone(&self.shared.policy.borrow());
        let config = self.shared.config.clone();

        let scores = tokio::task::spawn_blocking(move || {
            let mut env = TimeLimit::new(
                DinoEnv::with_config(config.game.clone(), &config.environment),
                config.max_steps_per_episode,
            );
            (0..episodes)
                .map(|episode| {
                    let mut observation = env.reset();
                    loop {
                        let step = env.step(policy.best_action(&discretize(&observation)));
                        observation = step.observation;
                        if step.is_over() {
                            break;
                        }
                    }
                    let score = env.score();
                    info!(episode = episode + 1, score, "Evaluation episode finished");
                    score
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(EvaluationReport::from_scores(scores))
    }

    /// Reload learned state from disk. Only allowed while idle.
    pub async fn load_checkpoint(&self) -> Result<bool> {
        let mut slot = self.shared.agent.lock().await;
        let Some(agent) = slot.as_mut().filter(|_| self.phase() == Phase::Idle) else {
            return Err(TrainerError::AlreadyRunning);
        };
        let store = self.shared.store.clone();
        let Some((checkpoint, _summary)) = tokio::task::spawn_blocking(move || store.load()).await??
        else {
            return Ok(false);
        };
        let stats = apply_checkpoint(checkpoint, agent, self.shared.config.history_window)?;
        self.shared.policy.send_replace(agent.policy());
        self.shared.checkpoint_loaded.store(true, Ordering::Release);
        *self.shared.stats.write().await = stats;
        Ok(true)
    }

    /// Write a checkpoint now. Only allowed while idle.
    pub async fn save_checkpoint(&self) -> Result<()> {
        let snapshot = {
            let slot = self.shared.agent.lock().await;
            match slot.as_ref().filter(|_| self.phase() == Phase::Idle) {
                Some(agent) => agent.snapshot(),
                None => return Err(TrainerError::AlreadyRunning),
            }
        };

        let mut pending = self.shared.stats.read().await.clone();
        pending.generation += 1;
        let store = self.shared.store.clone();
        let saved = tokio::task::spawn_blocking(move || {
            write_checkpoint(&store, snapshot, &pending).map(|()| pending)
        })
        .await??;

        self.shared.stats.write().await.generation = saved.generation;
        Ok(())
    }
}

/// Read the store into `agent`; the agent is untouched on error
fn restore(
    store: &CheckpointStore,
    agent: &mut QLearningAgent,
    history_window: usize,
) -> Result<Option<TrainingStats>> {
    match store.load()? {
        Some((checkpoint, _summary)) => apply_checkpoint(checkpoint, agent, history_window).map(Some),
        None => Ok(None),
    }
}

fn apply_checkpoint(
    checkpoint: Checkpoint,
    agent: &mut QLearningAgent,
    history_window: usize,
) -> Result<TrainingStats> {
    let stats = checkpoint.to_stats(history_window);
    agent.restore(checkpoint.agent)?;
    Ok(stats)
}

/// Rebuild an agent around a published policy after its worker was lost
fn recover_agent(config: &AgentConfig, table: QTable, exploration_rate: f64) -> QLearningAgent {
    let mut agent = QLearningAgent::new(config.clone());
    let restored = agent.restore(AgentSnapshot {
        table,
        exploration_rate,
        total_updates: 0,
    });
    if let Err(e) = restored {
        error!(error = %e, "Could not rebuild agent from published policy");
    }
    agent
}

fn write_checkpoint(
    store: &CheckpointStore,
    snapshot: AgentSnapshot,
    stats: &TrainingStats,
) -> dino_rl_core::Result<()> {
    let checkpoint = Checkpoint::capture(snapshot, stats);
    store.save(&checkpoint, &checkpoint.summary(stats.average_score()))
}

/// How a run ended
enum RunEnd {
    Completed,
    Stopped,
}

/// Owns a run from the async side: hands the agent to the blocking worker,
/// takes it back, and always returns the trainer to idle
async fn supervise(shared: Arc<Shared>, agent: QLearningAgent, episodes: usize) {
    let worker_shared = Arc::clone(&shared);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut agent = agent;
        let result = run_episodes(&worker_shared, &mut agent, episodes);
        (agent, result)
    })
    .await;

    let message = match outcome {
        Ok((agent, result)) => {
            *shared.agent.lock().await = Some(agent);
            match result {
                Ok(RunEnd::Completed) => "Training complete, model saved".to_string(),
                Ok(RunEnd::Stopped) => "Training stopped, model saved".to_string(),
                Err(e) => {
                    error!(error = %e, "Training failed");
                    format!("training failed: {e}")
                }
            }
        }
        Err(e) => {
            // The agent was lost with the worker; rebuild it from the last
            // published policy
            error!(error = %e, "Training worker panicked");
            let exploration_rate = shared.stats.read().await.exploration_rate;
            let table = (**shared.policy.borrow()).clone();
            let agent = recover_agent(&shared.config.agent, table, exploration_rate);
            *shared.agent.lock().await = Some(agent);
            format!("training failed: {e}")
        }
    };

    shared.set_phase(Phase::Idle);
    shared.notifier.log(message);
    let snapshot = {
        let stats = shared.stats.read().await;
        shared.snapshot(&stats)
    };
    shared.notifier.status(snapshot);
}

/// Blocking episode loop
fn run_episodes(shared: &Shared, agent: &mut QLearningAgent, episodes: usize) -> Result<RunEnd> {
    let config = &shared.config;
    let mut env = TimeLimit::new(
        DinoEnv::with_config(config.game.clone(), &config.environment),
        config.max_steps_per_episode,
    );
    let due = |episode: usize, interval: usize| interval > 0 && episode % interval == 0;

    let mut end = RunEnd::Completed;
    let mut completed = 0;
    let mut saved_through = None;

    for episode in 1..=episodes {
        if shared.phase() != Phase::Running {
            end = RunEnd::Stopped;
            break;
        }

        let started = Instant::now();
        let mut observation = env.reset();
        let mut total_reward = Reward::default();
        let mut steps = 0;
        let mut truncated = false;

        loop {
            if shared.phase() != Phase::Running {
                truncated = true;
                end = RunEnd::Stopped;
                break;
            }

            let action = agent.act(&observation);
            let step = env.step(action);
            let transition =
                Transition::new(observation, action, step.reward, step.observation, step.done);
            agent.remember(transition.clone());
            agent.learn(&transition);

            total_reward += step.reward;
            steps += 1;
            observation = step.observation;

            if step.done {
                break;
            }
            if step.truncated {
                truncated = true;
                break;
            }
        }

        agent.end_episode();
        shared.policy.send_replace(agent.policy());
        let score = env.score();
        let elapsed = started.elapsed().as_secs_f64();
        let stopped = matches!(end, RunEnd::Stopped);

        let recorded = if stopped || episode == episodes || due(episode, config.checkpoint_interval) {
            // Apply the episode only once its checkpoint is on disk
            let mut pending = shared.stats.blocking_read().clone();
            let recorded = pending.record(
                score,
                total_reward.value(),
                steps,
                truncated,
                agent.exploration_rate(),
                elapsed,
            );
            pending.generation += 1;
            write_checkpoint(&shared.store, agent.snapshot(), &pending)?;
            *shared.stats.blocking_write() = pending;
            saved_through = Some(episode);
            shared.notifier.log(format!("Model saved (episode {episode})"));
            recorded
        } else {
            shared.stats.blocking_write().record(
                score,
                total_reward.value(),
                steps,
                truncated,
                agent.exploration_rate(),
                elapsed,
            )
        };
        completed = episode;

        debug!(
            episode,
            score,
            reward = total_reward.value(),
            steps,
            truncated,
            epsilon = agent.exploration_rate(),
            "Episode finished"
        );

        if due(episode, config.status_interval) {
            let snapshot = shared.snapshot(&shared.stats.blocking_read());
            shared.notifier.status(snapshot);
            let message = format!(
                "Episode {episode}/{episodes}, Score: {score:.1}, Average: {:.1}, Epsilon: {:.3}",
                recorded.average_score,
                agent.exploration_rate()
            );
            info!("{message}");
            shared.notifier.log(message);
        }

        if stopped {
            break;
        }
    }

    match end {
        RunEnd::Stopped => {
            // Stopped between episodes, possibly before the first one: the
            // latest learned state has no checkpoint yet
            if saved_through != Some(completed) {
                let mut pending = shared.stats.blocking_read().clone();
                pending.generation += 1;
                write_checkpoint(&shared.store, agent.snapshot(), &pending)?;
                *shared.stats.blocking_write() = pending;
            }
            info!(episodes = completed, "Training stopped");
        }
        RunEnd::Completed => info!(episodes, "Training complete"),
    }

    Ok(end)
}
