//! Observation quantization into lookup keys

use serde::{Deserialize, Serialize};

use dino_rl_core::{Observation, OBSERVATION_DIM};

/// Finite lookup key derived from an [`Observation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscreteKey(pub [i32; OBSERVATION_DIM]);

/// Features scaled by 10 before truncation: vertical offset, vertical
/// velocity, obstacle distance and speed
const FINE_DIMENSIONS: [bool; OBSERVATION_DIM] =
    [true, true, false, false, true, false, false, false, true];

/// Quantize each feature independently, truncating toward zero
#[must_use]
pub fn discretize(observation: &Observation) -> DiscreteKey {
    let mut key = [0_i32; OBSERVATION_DIM];
    for ((slot, &value), &fine) in key.iter_mut().zip(observation.0.iter()).zip(FINE_DIMENSIONS.iter()) {
        let scaled = if fine { value * 10.0 } else { value };
        *slot = scaled as i32;
    }
    DiscreteKey(key)
}
