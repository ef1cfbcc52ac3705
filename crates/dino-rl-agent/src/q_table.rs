//! Action-value table keyed by discretized observations

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use dino_rl_core::Action;

use crate::discretize::DiscreteKey;

/// One value per action, indexed by [`Action::index`]
pub type ActionValues = [f64; Action::COUNT];

/// Sparse action-value table.
///
/// Absent keys read as all-zero rows without being inserted. Rows are kept in
/// insertion order so serialized tables are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: IndexMap<DiscreteKey, ActionValues>,
}

impl QTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row for `key`, zeros when absent
    #[must_use]
    pub fn get(&self, key: &DiscreteKey) -> ActionValues {
        self.values.get(key).copied().unwrap_or_default()
    }

    /// Mutable row for `key`, inserting a zero row first when absent
    pub fn row_mut(&mut self, key: DiscreteKey) -> &mut ActionValues {
        self.values.entry(key).or_default()
    }

    /// Whether `key` has been materialized
    #[must_use]
    pub fn contains(&self, key: &DiscreteKey) -> bool {
        self.values.contains_key(key)
    }

    /// Highest value at `key`
    #[must_use]
    pub fn max_value(&self, key: &DiscreteKey) -> f64 {
        self.get(key).into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action at `key`; ties go to the lowest index
    #[must_use]
    pub fn best_action(&self, key: &DiscreteKey) -> Action {
        let row = self.get(key);
        let mut best = 0;
        for (index, &value) in row.iter().enumerate().skip(1) {
            if value > row[best] {
                best = index;
            }
        }
        Action::from_index(best)
    }

    /// Number of materialized rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no row has been materialized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every row
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Rows in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&DiscreteKey, &ActionValues)> {
        self.values.iter()
    }
}
