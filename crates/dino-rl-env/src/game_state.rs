//! Conversion of browser game-state snapshots into observations

use serde::{Deserialize, Serialize};

use dino_rl_core::Observation;

use crate::dino::{DinoConfig, ObstacleKind};

/// Runner state as reported by a live game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DinoSnapshot {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Whether the runner is airborne
    #[serde(alias = "isJumping", default)]
    pub is_jumping: bool,
    /// Whether the runner is ducking
    #[serde(alias = "isDucking", default)]
    pub is_ducking: bool,
    /// Vertical velocity, when the client reports it
    #[serde(alias = "velocityY", default)]
    pub velocity_y: f64,
}

/// Obstacle as reported by a live game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Variant
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
}

/// Full game state sent by a browser client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Runner
    pub dino: DinoSnapshot,
    /// Live obstacles, in any order
    #[serde(default)]
    pub obstacles: Vec<ObstacleSnapshot>,
    /// Current scroll speed
    pub speed: f64,
    /// Current score
    #[serde(default)]
    pub score: f64,
}

impl GameSnapshot {
    /// Encode this snapshot the same way the simulator encodes its own state
    #[must_use]
    pub fn to_observation(&self, config: &DinoConfig) -> Observation {
        let nearest = self
            .obstacles
            .iter()
            .filter(|o| o.x > self.dino.x)
            .min_by(|a, b| a.x.total_cmp(&b.x))
            .map(|o| (o.x - self.dino.x, o.y, o.kind));

        config.observation(
            self.dino.y,
            self.dino.velocity_y,
            self.dino.is_jumping,
            self.dino.is_ducking,
            nearest,
            self.speed,
        )
    }
}
