//! Variable bag for formula evaluation.
//!
//! A `VariableBag` is the numeric environment a `Scaling` is evaluated
//! against: resolved craft stats, state fields, buff stack counts and any
//! named variable the caller adds. Lookups of names that are not present
//! resolve to `0.0`; the host's own formulas behave the same way and the
//! engine must match them.

use crate::ids::StatId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known variable names.
pub mod names {
    /// Current pool.
    pub const POOL: &str = "pool";
    /// Maximum pool.
    pub const MAX_POOL: &str = "max_pool";
    /// Current stability.
    pub const STABILITY: &str = "stability";
    /// Maximum stability.
    pub const MAX_STABILITY: &str = "max_stability";
    /// Current toxicity.
    pub const TOXICITY: &str = "toxicity";
    /// Current completion.
    pub const COMPLETION: &str = "completion";
    /// Current perfection.
    pub const PERFECTION: &str = "perfection";
    /// Current turn.
    pub const TURN: &str = "turn";
    /// Stack count of the buff whose effect is being evaluated.
    pub const STACKS: &str = "stacks";
    /// Percentage added to every pool cost (negative values reduce it).
    pub const POOL_COST_PERCENTAGE: &str = "pool_cost_percentage";
    /// Percentage added to every stability cost.
    pub const STABILITY_COST_PERCENTAGE: &str = "stability_cost_percentage";
    /// Flat addition to a technique's success chance, in `[0, 1]` units.
    pub const SUCCESS_CHANCE_BONUS: &str = "success_chance_bonus";
}

/// Numeric variables available to formulas.
///
/// # Examples
///
/// ```rust
/// use craftsage::VariableBag;
///
/// let mut vars = VariableBag::new();
/// vars.set("control", 40.0);
///
/// assert_eq!(vars.get("control"), 40.0);
/// assert_eq!(vars.get("missing"), 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableBag {
    values: HashMap<StatId, f64>,
}

impl VariableBag {
    /// Create a new empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<StatId>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Add to a variable, treating a missing entry as `0.0`.
    pub fn add(&mut self, key: impl Into<StatId>, value: f64) {
        *self.values.entry(key.into()).or_insert(0.0) += value;
    }

    /// Look up a variable. Missing names resolve to `0.0`.
    pub fn get(&self, key: &str) -> f64 {
        self.values
            .get(&StatId::from_str(key))
            .copied()
            .unwrap_or(0.0)
    }

    /// Look up a variable by id. Missing ids resolve to `0.0`.
    pub fn get_id(&self, key: &StatId) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Check whether a variable is explicitly present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&StatId::from_str(key))
    }

    /// Return a copy of this bag with one extra variable set.
    pub fn with(&self, key: impl Into<StatId>, value: f64) -> Self {
        let mut bag = self.clone();
        bag.set(key, value);
        bag
    }

    /// Iterate over all explicitly set variables.
    pub fn iter(&self) -> impl Iterator<Item = (&StatId, f64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(StatId, f64)> for VariableBag {
    fn from_iter<I: IntoIterator<Item = (StatId, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
