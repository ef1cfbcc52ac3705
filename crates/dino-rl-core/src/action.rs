//! Action representations and the action space

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three moves available to the runner on every tick.
///
/// Decoding is lenient: any index or name outside the known set maps to
/// [`Action::None`], which leaves the runner's movement unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Keep running; releases a duck
    #[default]
    None,
    /// Jump if standing
    Jump,
    /// Duck if not airborne
    Duck,
}

impl Action {
    /// Number of distinct actions
    pub const COUNT: usize = 3;

    /// All actions in index order
    pub const ALL: [Action; Self::COUNT] = [Action::None, Action::Jump, Action::Duck];

    /// Index of this action in Q-value rows
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::Jump => 1,
            Self::Duck => 2,
        }
    }

    /// Decode an action index; out-of-range indices become `None`
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(Self::None)
    }

    /// Wire name used by the control bridge
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Jump => "jump",
            Self::Duck => "duck",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "jump" => Self::Jump,
            "duck" => Self::Duck,
            _ => Self::None,
        })
    }
}

/// Discrete action space over [`Action`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionSpace;

impl ActionSpace {
    /// Sample a uniformly random action
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        Action::from_index(rng.gen_range(0..Action::COUNT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_index_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_index(action.index()), action);
        }
    }

    #[test]
    fn test_unknown_values_decode_as_none() {
        assert_eq!(Action::from_index(7), Action::None);
        assert_eq!("fly".parse::<Action>().unwrap(), Action::None);
        assert_eq!(" JUMP ".parse::<Action>().unwrap(), Action::Jump);
    }

    #[test]
    fn test_sample_covers_space() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; Action::COUNT];
        for _ in 0..200 {
            seen[ActionSpace.sample(&mut rng).index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Action::Duck).unwrap(), "\"duck\"");
        let parsed: Action = serde_json::from_str("\"jump\"").unwrap();
        assert_eq!(parsed, Action::Jump);
    }
}
