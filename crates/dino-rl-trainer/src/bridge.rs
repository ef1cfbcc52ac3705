//! Live control bridge: WebSocket and REST access to a running trainer

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply as WarpReply};

use dino_rl_core::{Action, Observation};
use dino_rl_env::GameSnapshot;

use crate::error::{Result, TrainerError};
use crate::notify::{LogEntry, Notification};
use crate::orchestrator::{StopReport, Trainer};
use crate::stats::StatusSnapshot;

/// Episodes used when a start command does not name a count
pub const DEFAULT_EPISODES: usize = 100;

fn default_episodes() -> usize {
    DEFAULT_EPISODES
}

/// Client command
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartTraining {
        #[serde(default = "default_episodes")]
        episodes: usize,
    },
    StopTraining,
    GetAction {
        #[serde(default)]
        observation: Option<Vec<f64>>,
        #[serde(default)]
        game_state: Option<GameSnapshot>,
    },
    GetStatus,
}

/// Message sent to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Reply {
    TrainingStatus(StatusSnapshot),
    TrainingLog(LogEntry),
    TrainingStopped(StopReport),
    AiAction { action: Action },
    Error { message: String },
}

impl Reply {
    fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::text(text)),
            Err(e) => {
                warn!(error = %e, "Failed to encode reply");
                None
            }
        }
    }
}

impl From<Notification> for Reply {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::Status(snapshot) => Reply::TrainingStatus(snapshot),
            Notification::Log(entry) => Reply::TrainingLog(entry),
        }
    }
}

/// Body of `POST /api/training/start`
#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default = "default_episodes")]
    episodes: usize,
}

/// Body of `POST /api/ai/action`
#[derive(Debug, Deserialize)]
struct ActionRequest {
    #[serde(default)]
    observation: Option<Vec<f64>>,
    #[serde(default)]
    game_state: Option<GameSnapshot>,
}

/// Control server bound to one trainer
pub struct ControlServer {
    trainer: Trainer,
}

impl ControlServer {
    pub fn new(trainer: Trainer) -> Self {
        Self { trainer }
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    /// Parse and run one text command. Malformed input yields an error reply
    /// and leaves the trainer untouched.
    pub async fn handle_text(&self, text: &str) -> Option<Reply> {
        match serde_json::from_str::<Command>(text) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => {
                warn!(error = %e, "Rejected malformed command");
                Some(Reply::error(format!("invalid command: {e}")))
            }
        }
    }

    /// Run one command; `None` when the outcome reaches clients as a
    /// broadcast notification instead
    pub async fn handle_command(&self, command: Command) -> Option<Reply> {
        debug!(?command, "Handling command");
        match command {
            Command::StartTraining { episodes } => match self.trainer.start(episodes).await {
                Ok(_) => None,
                Err(e) => Some(Reply::error(e.to_string())),
            },
            Command::StopTraining => match self.trainer.stop().await {
                Ok(report) => Some(Reply::TrainingStopped(report)),
                Err(e) => Some(Reply::error(e.to_string())),
            },
            Command::GetAction {
                observation,
                game_state,
            } => Some(match self.resolve_action(observation, game_state) {
                Ok(action) => Reply::AiAction { action },
                Err(message) => {
                    warn!(%message, "Rejected action query");
                    Reply::error(message)
                }
            }),
            Command::GetStatus => Some(Reply::TrainingStatus(self.trainer.status().await)),
        }
    }

    fn resolve_action(
        &self,
        observation: Option<Vec<f64>>,
        game_state: Option<GameSnapshot>,
    ) -> std::result::Result<Action, String> {
        match (observation, game_state) {
            (Some(values), _) => Observation::from_slice(&values)
                .map(|obs| self.trainer.query_action(&obs))
                .map_err(|e| e.to_string()),
            (None, Some(snapshot)) => Ok(self.trainer.query_action_for_game(&snapshot)),
            (None, None) => Err("get_action needs an observation or a game_state".into()),
        }
    }

    /// All routes: `/ws` plus the REST API
    pub fn routes(
        self: &Arc<Self>,
    ) -> impl Filter<Extract = impl WarpReply, Error = Rejection> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_headers(vec!["content-type"])
            .allow_methods(vec!["GET", "POST"]);

        let ws = warp::path!("ws")
            .and(warp::ws())
            .and(with_server(Arc::clone(self)))
            .map(|ws: warp::ws::Ws, server: Arc<ControlServer>| {
                ws.on_upgrade(move |socket| client_connected(socket, server))
            });

        let status = warp::path!("api" / "training" / "status")
            .and(warp::get())
            .and(with_server(Arc::clone(self)))
            .and_then(handle_get_status);

        let start = warp::path!("api" / "training" / "start")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_server(Arc::clone(self)))
            .and_then(handle_start_training);

        let stop = warp::path!("api" / "training" / "stop")
            .and(warp::post())
            .and(with_server(Arc::clone(self)))
            .and_then(handle_stop_training);

        let action = warp::path!("api" / "ai" / "action")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_server(Arc::clone(self)))
            .and_then(handle_get_action);

        ws.or(status).or(start).or(stop).or(action).with(cors)
    }

    /// Serve until `signal` resolves, then drain the trainer
    pub async fn serve(
        self: Arc<Self>,
        addr: SocketAddr,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, signal)
            .map_err(|e| TrainerError::Config(format!("cannot bind {addr}: {e}")))?;

        info!("Control server listening on ws://{bound}/ws");
        server.await;

        info!("Control server stopped, draining trainer");
        self.trainer.shutdown().await;
        Ok(())
    }
}

async fn client_connected(socket: WebSocket, server: Arc<ControlServer>) {
    let (mut sink, mut stream) = socket.split();
    let mut notifications = server.trainer.subscribe();
    debug!("Client connected");

    let hello = Reply::TrainingStatus(server.trainer.status().await);
    if let Some(message) = hello.to_message() {
        if sink.send(message).await.is_err() {
            return;
        }
    }

    loop {
        let reply = tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(message)) => match message.to_str() {
                    Ok(text) => server.handle_text(text).await,
                    // Ping, pong and binary frames carry no commands
                    Err(()) => None,
                },
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => Some(Reply::from(notification)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Client lagged behind notifications");
                    None
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Some(message) = reply.as_ref().and_then(Reply::to_message) {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    }

    debug!("Client disconnected");
}

async fn handle_get_status(server: Arc<ControlServer>) -> std::result::Result<impl WarpReply, Rejection> {
    Ok(warp::reply::json(&server.trainer.status().await))
}

async fn handle_start_training(
    request: StartRequest,
    server: Arc<ControlServer>,
) -> std::result::Result<impl WarpReply, Rejection> {
    Ok(match server.trainer.start(request.episodes).await {
        Ok(run_id) => warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "started",
                "run_id": run_id,
                "episodes": request.episodes,
            })),
            StatusCode::OK,
        ),
        Err(e) => {
            let code = match e {
                TrainerError::AlreadyRunning => StatusCode::CONFLICT,
                TrainerError::InvalidEpisodes => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "status": "error",
                    "message": format!("Failed to start training: {e}"),
                })),
                code,
            )
        }
    })
}

async fn handle_stop_training(server: Arc<ControlServer>) -> std::result::Result<impl WarpReply, Rejection> {
    Ok(match server.trainer.stop().await {
        Ok(report) => warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "stopped",
                "worker_exited": report.worker_exited,
                "episodes_completed": report.episodes_completed,
            })),
            StatusCode::OK,
        ),
        Err(e) => warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "error",
                "message": format!("Failed to stop training: {e}"),
            })),
            StatusCode::CONFLICT,
        ),
    })
}

async fn handle_get_action(
    request: ActionRequest,
    server: Arc<ControlServer>,
) -> std::result::Result<impl WarpReply, Rejection> {
    Ok(match server.resolve_action(request.observation, request.game_state) {
        Ok(action) => warp::reply::with_status(
            warp::reply::json(&json!({ "action": action })),
            StatusCode::OK,
        ),
        Err(message) => warp::reply::with_status(
            warp::reply::json(&json!({ "status": "error", "message": message })),
            StatusCode::BAD_REQUEST,
        ),
    })
}

/// Helper to pass the server to handlers
fn with_server(
    server: Arc<ControlServer>,
) -> impl Filter<Extract = (Arc<ControlServer>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&server))
}
