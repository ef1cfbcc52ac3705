//! Observation vectors emitted by the environment

use serde::{Deserialize, Serialize};

use crate::{RLError, Result};

/// Number of features in an [`Observation`]
pub const OBSERVATION_DIM: usize = 9;

/// Fixed-length, normalized view of the game on a single tick.
///
/// Layout: vertical offset, vertical velocity, jumping flag, ducking flag,
/// nearest obstacle distance, nearest obstacle height, nearest obstacle type,
/// obstacle presence, normalized speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation(pub [f64; OBSERVATION_DIM]);

impl Observation {
    /// Index of the vertical offset feature
    pub const VERTICAL_OFFSET: usize = 0;
    /// Index of the vertical velocity feature
    pub const VERTICAL_VELOCITY: usize = 1;
    /// Index of the jumping flag
    pub const JUMPING: usize = 2;
    /// Index of the ducking flag
    pub const DUCKING: usize = 3;
    /// Index of the nearest obstacle distance
    pub const OBSTACLE_DISTANCE: usize = 4;
    /// Index of the nearest obstacle height
    pub const OBSTACLE_HEIGHT: usize = 5;
    /// Index of the nearest obstacle type
    pub const OBSTACLE_TYPE: usize = 6;
    /// Index of the obstacle presence flag
    pub const OBSTACLE_PRESENT: usize = 7;
    /// Index of the normalized speed
    pub const SPEED: usize = 8;

    /// All-zero observation
    #[must_use]
    pub fn zeros() -> Self {
        Self([0.0; OBSERVATION_DIM])
    }

    /// Build an observation from an arbitrary slice, checking its length and
    /// that every value is finite
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let data: [f64; OBSERVATION_DIM] =
            values.try_into().map_err(|_| RLError::DimensionMismatch {
                expected: OBSERVATION_DIM,
                actual: values.len(),
            })?;
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(RLError::InvalidObservation(format!(
                "feature {pos} is not finite"
            )));
        }
        Ok(Self(data))
    }

    /// Feature values
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self::zeros()
    }
}
