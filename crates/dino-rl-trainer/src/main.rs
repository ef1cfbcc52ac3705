// Dino Arena training CLI
// Trains, evaluates and serves the tabular dino runner agent

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dino_rl_trainer::{ControlServer, Notification, Trainer, TrainerConfig};

#[derive(Parser)]
#[command(name = "dino-arena")]
#[command(about = "Tabular Q-learning trainer for the dino runner", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Checkpoint directory, overriding the configuration file
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train in the foreground; Ctrl-C stops after the current tick
    Train {
        /// Number of episodes
        #[arg(short, long, default_value = "1000")]
        episodes: usize,

        /// Ignore any existing checkpoint
        #[arg(long)]
        fresh: bool,
    },

    /// Play greedy episodes and write test_results.json
    Test {
        /// Number of episodes
        #[arg(short, long, default_value = "10")]
        episodes: usize,
    },

    /// Run the live control server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrainerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrainerConfig::default(),
    };
    if let Some(dir) = cli.checkpoint_dir {
        config.checkpoint_dir = dir;
    }

    match cli.command {
        Commands::Train { episodes, fresh } => train(config, episodes, fresh).await,
        Commands::Test { episodes } => test(config, episodes).await,
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
    }
}

async fn train(config: TrainerConfig, episodes: usize, fresh: bool) -> Result<()> {
    let trainer = if fresh {
        Trainer::new_fresh(config)
    } else {
        Trainer::new(config)
    };
    if trainer.checkpoint_loaded() {
        let status = trainer.status().await;
        info!(
            episodes = status.total_episodes,
            best_score = status.best_score,
            "Continuing from saved model"
        );
    }

    // Run-level progress already goes through tracing; only forward failures
    let mut notifications = trainer.subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            if let Notification::Log(entry) = notification {
                if entry.message.starts_with("training failed") {
                    warn!("{}", entry.message);
                }
            }
        }
    });

    trainer.start(episodes).await.context("Failed to start training")?;

    let stopper = trainer.clone();
    tokio::select! {
        () = trainer.join() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, stopping training");
            // NotRunning means the run finished on its own meanwhile
            if let Ok(report) = stopper.stop().await {
                if !report.worker_exited {
                    warn!("Worker still finishing, waiting for it");
                }
            }
            trainer.join().await;
        }
    }

    let status = trainer.status().await;
    info!(
        episodes = status.episode,
        best_score = status.best_score,
        average_score = status.average_score,
        epsilon = status.exploration_rate,
        "Training finished"
    );
    Ok(())
}

async fn test(config: TrainerConfig, episodes: usize) -> Result<()> {
    let trainer = Trainer::new(config);
    if !trainer.checkpoint_loaded() {
        bail!(
            "No trained model found in {}",
            trainer.config().checkpoint_dir.display()
        );
    }

    let report = trainer.evaluate(episodes).await?;
    info!(
        average = report.average_score,
        max = report.max_score,
        min = report.min_score,
        "Evaluation complete"
    );

    let path = PathBuf::from("test_results.json");
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Test results saved to {}", path.display());
    Ok(())
}

async fn serve(config: TrainerConfig) -> Result<()> {
    let addr = config.socket_addr();
    let server = std::sync::Arc::new(ControlServer::new(Trainer::new(config)));

    server
        .serve(addr, async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Ctrl-C handler unavailable, serving until killed");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
