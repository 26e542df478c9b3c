//! Craft state.
//!
//! `CraftState` is an immutable snapshot of an in-progress craft. The
//! transition engine never mutates a state it was given; it clones, applies
//! effects to the clone and hands the new value back to the search frame
//! that asked for it.

use crate::catalog::Catalog;
use crate::error::{CraftError, Result};
use crate::ids::{BuffId, StatId, TechniqueId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Volatile craft-wide condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    VeryNegative,
    Negative,
    #[default]
    Neutral,
    Positive,
    VeryPositive,
}

impl Condition {
    /// One step closer to `Neutral`.
    pub fn toward_neutral(self) -> Self {
        match self {
            Condition::VeryNegative => Condition::Negative,
            Condition::Negative | Condition::Neutral | Condition::Positive => Condition::Neutral,
            Condition::VeryPositive => Condition::Positive,
        }
    }
}

/// Stack count of one active buff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffStack {
    pub buff: BuffId,
    pub stacks: u32,
}

/// Active buffs in activation order.
///
/// Activation order decides the order buff triggers fire in, but two sets
/// of active buffs with the same stacks compare equal regardless of order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveBuffs(Vec<BuffStack>);

impl ActiveBuffs {
    /// No active buffs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack count of a buff, `0` when absent.
    pub fn stacks(&self, buff: &BuffId) -> u32 {
        self.0
            .iter()
            .find(|entry| &entry.buff == buff)
            .map(|entry| entry.stacks)
            .unwrap_or(0)
    }

    /// Whether the buff is active.
    pub fn contains(&self, buff: &BuffId) -> bool {
        self.stacks(buff) > 0
    }

    /// Add stacks, capped at `max`. A new buff goes to the end of the
    /// activation order.
    pub fn add(&mut self, buff: &BuffId, stacks: u32, max: u32) {
        if stacks == 0 {
            return;
        }
        match self.0.iter_mut().find(|entry| &entry.buff == buff) {
            Some(entry) => entry.stacks = entry.stacks.saturating_add(stacks).min(max),
            None => {
                let stacks = stacks.min(max);
                if stacks > 0 {
                    self.0.push(BuffStack {
                        buff: buff.clone(),
                        stacks,
                    });
                }
            }
        }
    }

    /// Remove stacks; a buff that reaches zero is dropped.
    pub fn remove(&mut self, buff: &BuffId, stacks: u32) {
        if let Some(entry) = self.0.iter_mut().find(|entry| &entry.buff == buff) {
            entry.stacks = entry.stacks.saturating_sub(stacks);
        }
        self.0.retain(|entry| entry.stacks > 0);
    }

    /// Iterate in activation order.
    pub fn iter(&self) -> impl Iterator<Item = &BuffStack> {
        self.0.iter()
    }

    /// Number of active buffs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no buff is active.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for ActiveBuffs {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .all(|entry| other.stacks(&entry.buff) == entry.stacks)
    }
}

impl FromIterator<(BuffId, u32)> for ActiveBuffs {
    fn from_iter<I: IntoIterator<Item = (BuffId, u32)>>(iter: I) -> Self {
        let mut buffs = ActiveBuffs::new();
        for (buff, stacks) in iter {
            buffs.add(&buff, stacks, u32::MAX);
        }
        buffs
    }
}

/// Lifecycle classification of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CraftOutcome {
    InProgress,
    /// Completion reached its target.
    Completed,
    /// Stability hit zero.
    Failed,
    /// The turn limit ran out.
    Exhausted,
}

impl CraftOutcome {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CraftOutcome::InProgress)
    }
}

/// Snapshot of an in-progress craft.
///
/// # Examples
///
/// ```rust
/// use craftsage::CraftState;
///
/// let state = CraftState::new(20.0, 5.0).with_stat("intensity", 12.0);
/// assert_eq!(state.pool, 20.0);
/// assert_eq!(state.max_stability, 5.0);
/// assert_eq!(state.stat("intensity"), 12.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftState {
    pub pool: f64,
    pub max_pool: f64,
    pub stability: f64,
    pub max_stability: f64,
    #[serde(default)]
    pub toxicity: f64,
    #[serde(default)]
    pub completion: f64,
    #[serde(default)]
    pub perfection: f64,
    /// Completion gained past the cap.
    #[serde(default)]
    pub wasted_completion: f64,
    /// Perfection gained past the cap.
    #[serde(default)]
    pub wasted_perfection: f64,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub active_buffs: ActiveBuffs,
    /// Remaining cooldown turns; techniques at zero are absent.
    #[serde(default)]
    pub cooldowns: BTreeMap<TechniqueId, u32>,
    #[serde(default)]
    pub turn: u32,
    /// Base crafter stats before buff modifiers.
    #[serde(default)]
    pub stats: BTreeMap<StatId, f64>,
}

impl CraftState {
    /// A fresh craft with full pool and stability.
    pub fn new(pool: f64, stability: f64) -> Self {
        Self {
            pool,
            max_pool: pool,
            stability,
            max_stability: stability,
            toxicity: 0.0,
            completion: 0.0,
            perfection: 0.0,
            wasted_completion: 0.0,
            wasted_perfection: 0.0,
            condition: Condition::Neutral,
            active_buffs: ActiveBuffs::new(),
            cooldowns: BTreeMap::new(),
            turn: 0,
            stats: BTreeMap::new(),
        }
    }

    /// Parse a host snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CraftError::InvalidState(e.to_string()))
    }

    /// Set a base stat.
    pub fn with_stat(mut self, stat: impl Into<StatId>, value: f64) -> Self {
        self.stats.insert(stat.into(), value);
        self
    }

    /// Set the condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Add buff stacks without a cap (snapshot construction).
    pub fn with_buff(mut self, buff: impl Into<BuffId>, stacks: u32) -> Self {
        self.active_buffs.add(&buff.into(), stacks, u32::MAX);
        self
    }

    /// Base stat value, `0.0` when absent.
    pub fn stat(&self, stat: &str) -> f64 {
        self.stats
            .get(&StatId::from_str(stat))
            .copied()
            .unwrap_or(0.0)
    }

    /// Remaining cooldown of a technique.
    pub fn cooldown(&self, technique: &TechniqueId) -> u32 {
        self.cooldowns.get(technique).copied().unwrap_or(0)
    }

    /// Check every state invariant against the catalog.
    ///
    /// Snapshots that fail are rejected with `InvalidState` instead of
    /// being repaired.
    pub fn validate(&self, catalog: &Catalog) -> Result<()> {
        let numbers = [
            ("pool", self.pool),
            ("maxPool", self.max_pool),
            ("stability", self.stability),
            ("maxStability", self.max_stability),
            ("toxicity", self.toxicity),
            ("completion", self.completion),
            ("perfection", self.perfection),
            ("wastedCompletion", self.wasted_completion),
            ("wastedPerfection", self.wasted_perfection),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(CraftError::InvalidState(format!("{} is not finite", name)));
            }
            if value < 0.0 {
                return Err(CraftError::InvalidState(format!(
                    "{} is negative ({})",
                    name, value
                )));
            }
        }
        if self.pool > self.max_pool {
            return Err(CraftError::InvalidState(format!(
                "pool {} exceeds maxPool {}",
                self.pool, self.max_pool
            )));
        }
        if self.stability > self.max_stability {
            return Err(CraftError::InvalidState(format!(
                "stability {} exceeds maxStability {}",
                self.stability, self.max_stability
            )));
        }
        for (stat, value) in &self.stats {
            if !value.is_finite() {
                return Err(CraftError::InvalidState(format!("stat {} is not finite", stat)));
            }
        }
        let mut seen = BTreeSet::new();
        for entry in self.active_buffs.iter() {
            if !seen.insert(&entry.buff) {
                return Err(CraftError::InvalidState(format!(
                    "buff {} is listed more than once",
                    entry.buff
                )));
            }
            let buff = catalog.buff(&entry.buff)?;
            if entry.stacks == 0 || entry.stacks > buff.max_stacks() {
                return Err(CraftError::InvalidState(format!(
                    "buff {} has {} stacks (max {})",
                    entry.buff,
                    entry.stacks,
                    buff.max_stacks()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focus() -> BuffId {
        BuffId::from_str("focus")
    }

    #[test]
    fn test_buff_add_and_cap() {
        let mut buffs = ActiveBuffs::new();
        buffs.add(&focus(), 3, 5);
        buffs.add(&focus(), 4, 5);
        assert_eq!(buffs.stacks(&focus()), 5);
    }

    #[test]
    fn test_buff_removed_at_zero() {
        let mut buffs = ActiveBuffs::new();
        buffs.add(&focus(), 2, 5);
        buffs.remove(&focus(), 5);
        assert!(!buffs.contains(&focus()));
        assert!(buffs.is_empty());
    }

    #[test]
    fn test_buff_equality_ignores_order() {
        let a: ActiveBuffs = vec![(focus(), 1), (BuffId::from_str("ward"), 2)]
            .into_iter()
            .collect();
        let b: ActiveBuffs = vec![(BuffId::from_str("ward"), 2), (focus(), 1)]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().next().map(|e| e.buff.clone()), Some(focus()));
    }

    #[test]
    fn test_condition_toward_neutral() {
        assert_eq!(Condition::VeryPositive.toward_neutral(), Condition::Positive);
        assert_eq!(Condition::Negative.toward_neutral(), Condition::Neutral);
        assert_eq!(Condition::Neutral.toward_neutral(), Condition::Neutral);
    }

    #[test]
    fn test_outcome_terminal() {
        assert!(!CraftOutcome::InProgress.is_terminal());
        assert!(CraftOutcome::Failed.is_terminal());
        assert!(CraftOutcome::Completed.is_terminal());
        assert!(CraftOutcome::Exhausted.is_terminal());
    }

    #[test]
    fn test_validate_rejects_negative_pool() {
        let mut state = CraftState::new(10.0, 5.0);
        state.pool = -1.0;
        let err = state.validate(&Catalog::new()).unwrap_err();
        assert!(matches!(err, CraftError::InvalidState(_)));
    }

    #[test]
    fn test_validate_rejects_stability_above_max() {
        let mut state = CraftState::new(10.0, 5.0);
        state.stability = 6.0;
        assert!(state.validate(&Catalog::new()).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_buff() {
        let state = CraftState::new(10.0, 5.0).with_buff("ghost", 1);
        assert_eq!(
            state.validate(&Catalog::new()),
            Err(CraftError::UnknownBuff(BuffId::from_str("ghost")))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_buff() {
        let catalog = Catalog::new().with_buff(crate::catalog::Buff::new("focus").stackable(5));
        let json = r#"{
            "pool": 20, "maxPool": 30, "stability": 5, "maxStability": 5,
            "activeBuffs": [{"buff": "focus", "stacks": 2}, {"buff": "focus", "stacks": 1}]
        }"#;
        let state = CraftState::from_json(json).unwrap();
        assert!(matches!(
            state.validate(&catalog),
            Err(CraftError::InvalidState(_))
        ));
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "pool": 20, "maxPool": 30, "stability": 5, "maxStability": 5,
            "condition": "positive",
            "activeBuffs": [{"buff": "focus", "stacks": 2}],
            "cooldowns": {"burst": 1},
            "stats": {"intensity": 12}
        }"#;
        let state = CraftState::from_json(json).unwrap();
        assert_eq!(state.condition, Condition::Positive);
        assert_eq!(state.active_buffs.stacks(&focus()), 2);
        assert_eq!(state.cooldown(&TechniqueId::from_str("burst")), 1);
        assert_eq!(state.stat("intensity"), 12.0);
        assert_eq!(state.turn, 0);
    }
}
