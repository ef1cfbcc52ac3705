use dino_rl_core::{Action, AgentConfig, EnvironmentConfig, Observation};
use dino_rl_trainer::{
    CheckpointStore, Notification, Phase, Trainer, TrainerConfig, TrainerError, TrainingSummary,
};
use std::path::Path;
use tokio::time::{sleep, Duration};

fn test_config(dir: &Path) -> TrainerConfig {
    TrainerConfig {
        checkpoint_dir: dir.to_path_buf(),
        agent: AgentConfig {
            seed: Some(1),
            ..AgentConfig::default()
        },
        environment: EnvironmentConfig { seed: Some(2) },
        ..TrainerConfig::default()
    }
}

#[tokio::test]
async fn test_start_then_stop_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));

    trainer.start(5).await.unwrap();
    let report = trainer.stop().await.unwrap();

    assert!(report.worker_exited);
    assert!(report.episodes_completed <= 5);
    assert_eq!(trainer.phase(), Phase::Idle);
    assert!(!trainer.status().await.running);
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));

    trainer.start(100_000).await.unwrap();
    assert!(matches!(
        trainer.start(5).await,
        Err(TrainerError::AlreadyRunning)
    ));
    assert!(trainer.is_running());

    trainer.stop().await.unwrap();
    assert_eq!(trainer.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_stop_while_idle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));
    assert!(matches!(trainer.stop().await, Err(TrainerError::NotRunning)));
}

#[tokio::test]
async fn test_zero_episodes_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));
    assert!(matches!(trainer.start(0).await, Err(TrainerError::InvalidEpisodes)));
    assert_eq!(trainer.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_status_every_five_episodes() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));
    let mut notifications = trainer.subscribe();

    trainer.start(10).await.unwrap();
    trainer.join().await;

    let mut running_statuses = Vec::new();
    let mut logs = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        match notification {
            Notification::Status(status) if status.running && status.episode > 0 => {
                running_statuses.push(status.episode);
            }
            Notification::Log(entry) => logs.push(entry.message),
            Notification::Status(_) => {}
        }
    }

    assert_eq!(running_statuses, vec![5, 10]);
    assert!(logs.iter().any(|m| m.starts_with("Training started")));
    assert!(logs.iter().any(|m| m.starts_with("Episode 5/10")));
    assert!(logs.iter().any(|m| m.starts_with("Training complete")));
}

#[tokio::test]
async fn test_checkpoint_written_at_completion() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let trainer = Trainer::new(config.clone());

    trainer.start(3).await.unwrap();
    trainer.join().await;

    let store = CheckpointStore::new(dir.path());
    assert!(store.model_path().exists());
    let summary: TrainingSummary =
        serde_json::from_slice(&std::fs::read(store.summary_path()).unwrap()).unwrap();
    assert_eq!(summary.episodes, 3);

    let status = trainer.status().await;
    assert_eq!(status.episode, 3);
    assert_eq!(status.total_episodes, 3);
    assert!(status.exploration_rate < 1.0);

    let resumed = Trainer::new(config);
    assert!(resumed.checkpoint_loaded());
    let resumed_status = resumed.status().await;
    assert_eq!(resumed_status.total_episodes, 3);
    assert_eq!(resumed_status.episode, 0);
    assert_eq!(resumed_status.best_score, status.best_score);
    assert_eq!(resumed_status.exploration_rate, status.exploration_rate);
}

#[tokio::test]
async fn test_stop_mid_run_saves() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));

    trainer.start(100_000).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    let report = trainer.stop().await.unwrap();
    assert!(report.worker_exited);

    let store = CheckpointStore::new(dir.path());
    let (checkpoint, summary) = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.total_episodes, report.episodes_completed);
    assert_eq!(summary.unwrap().generation, checkpoint.generation);
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    std::fs::write(store.model_path(), b"definitely not gzip").unwrap();

    let trainer = Trainer::new(test_config(dir.path()));
    assert!(!trainer.checkpoint_loaded());
    let status = trainer.status().await;
    assert_eq!(status.total_episodes, 0);
    assert_eq!(status.exploration_rate, 1.0);
}

#[tokio::test]
async fn test_fresh_ignores_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let trainer = Trainer::new(config.clone());
    trainer.start(2).await.unwrap();
    trainer.join().await;

    let fresh = Trainer::new_fresh(config);
    assert!(!fresh.checkpoint_loaded());
    assert_eq!(fresh.status().await.total_episodes, 0);
}

#[tokio::test]
async fn test_query_and_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));

    // Empty table: every key reads as zeros, ties go to None
    assert_eq!(trainer.query_action(&Observation::zeros()), Action::None);

    let mut updates = trainer.policy_updates();
    trainer.start(3).await.unwrap();
    trainer.join().await;
    assert!(updates.has_changed().unwrap());
    assert!(!updates.borrow_and_update().is_empty());

    let report = trainer.evaluate(2).await.unwrap();
    assert_eq!(report.episodes, 2);
    assert_eq!(report.scores.len(), 2);
    assert!(report.min_score <= report.average_score);
    assert!(report.average_score <= report.max_score);
    assert!(matches!(trainer.evaluate(0).await, Err(TrainerError::InvalidEpisodes)));
}

#[tokio::test]
async fn test_save_and_reload_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));
    assert!(!trainer.load_checkpoint().await.unwrap());

    trainer.save_checkpoint().await.unwrap();
    assert!(trainer.load_checkpoint().await.unwrap());
    assert!(trainer.checkpoint_loaded());

    trainer.start(100_000).await.unwrap();
    assert!(matches!(
        trainer.save_checkpoint().await,
        Err(TrainerError::AlreadyRunning)
    ));
    trainer.shutdown().await;
    assert_eq!(trainer.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_immediate_stop_still_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(test_config(dir.path()));

    trainer.start(5).await.unwrap();
    let report = trainer.stop().await.unwrap();
    assert!(report.worker_exited);

    // Holds whether or not the worker got through an episode first
    let store = CheckpointStore::new(dir.path());
    let (checkpoint, _) = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.total_episodes, report.episodes_completed);
}

#[tokio::test]
async fn test_failed_checkpoint_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();

    let trainer = Trainer::new(test_config(&blocker));
    assert!(!trainer.checkpoint_loaded());
    let mut notifications = trainer.subscribe();

    trainer.start(3).await.unwrap();
    trainer.join().await;

    assert_eq!(trainer.phase(), Phase::Idle);
    let status = trainer.status().await;
    assert!(!status.running);
    // The third episode only counts once its checkpoint lands
    assert_eq!(status.episode, 2);

    let mut logs = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        if let Notification::Log(entry) = notification {
            logs.push(entry.message);
        }
    }
    assert!(logs.iter().any(|m| m.starts_with("training failed: ")));
    assert!(!logs.iter().any(|m| m.starts_with("Training complete")));

    // The trainer accepts a new run after the failure
    trainer.start(1).await.unwrap();
    trainer.join().await;
    assert_eq!(trainer.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_load_checkpoint_adopts_saved_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let trained = Trainer::new(config.clone());
    trained.start(3).await.unwrap();
    trained.join().await;
    let expected = trained.policy_updates().borrow().clone();

    let fresh = Trainer::new_fresh(config);
    assert_eq!(fresh.status().await.total_episodes, 0);
    assert!(fresh.load_checkpoint().await.unwrap());

    assert_eq!(fresh.status().await.total_episodes, 3);
    assert_eq!(*fresh.policy_updates().borrow().clone(), *expected);
}
