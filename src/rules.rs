//! Craft rules and condition drift.
//!
//! `CraftRules` carries the host's per-craft constants: targets, limits and
//! how each condition scales costs. Condition drift is an injected policy;
//! the engine never hardcodes how the condition moves between turns.

use crate::error::{CraftError, Result};
use crate::state::Condition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn unit() -> f64 {
    1.0
}

/// Cost multipliers applied while a condition is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionModifiers {
    #[serde(default = "unit")]
    pub pool_cost: f64,
    #[serde(default = "unit")]
    pub stability_cost: f64,
}

impl Default for ConditionModifiers {
    fn default() -> Self {
        Self {
            pool_cost: 1.0,
            stability_cost: 1.0,
        }
    }
}

fn default_target() -> f64 {
    100.0
}

/// Per-craft constants supplied by the host.
///
/// # Examples
///
/// ```rust
/// use craftsage::{Condition, ConditionModifiers, CraftRules};
///
/// let rules = CraftRules::new(120.0, 80.0)
///     .with_max_turns(20)
///     .with_condition(Condition::Positive, ConditionModifiers {
///         pool_cost: 0.5,
///         stability_cost: 1.0,
///     });
///
/// assert_eq!(rules.condition(Condition::Positive).pool_cost, 0.5);
/// assert_eq!(rules.condition(Condition::Neutral).pool_cost, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftRules {
    /// Completion needed to finish the craft; also the completion cap.
    #[serde(default = "default_target")]
    pub completion_target: f64,
    #[serde(default = "default_target")]
    pub perfection_cap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Host toxicity limit, when the host imposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_toxicity: Option<f64>,
    /// Max stability lost on each technique use.
    #[serde(default = "unit")]
    pub max_stability_loss_per_use: f64,
    #[serde(default)]
    pub conditions: BTreeMap<Condition, ConditionModifiers>,
}

impl Default for CraftRules {
    fn default() -> Self {
        Self::new(default_target(), default_target())
    }
}

impl CraftRules {
    pub fn new(completion_target: f64, perfection_cap: f64) -> Self {
        Self {
            completion_target,
            perfection_cap,
            max_turns: None,
            max_toxicity: None,
            max_stability_loss_per_use: 1.0,
            conditions: BTreeMap::new(),
        }
    }

    /// Parse rules from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: CraftRules =
            serde_json::from_str(json).map_err(|e| CraftError::InvalidConfig(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn with_max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    pub fn with_max_toxicity(mut self, limit: f64) -> Self {
        self.max_toxicity = Some(limit);
        self
    }

    pub fn with_max_stability_loss(mut self, loss: f64) -> Self {
        self.max_stability_loss_per_use = loss;
        self
    }

    pub fn with_condition(mut self, condition: Condition, modifiers: ConditionModifiers) -> Self {
        self.conditions.insert(condition, modifiers);
        self
    }

    /// Modifiers for a condition; neutral multipliers when unspecified.
    pub fn condition(&self, condition: Condition) -> ConditionModifiers {
        self.conditions.get(&condition).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("completionTarget", self.completion_target),
            ("perfectionCap", self.perfection_cap),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CraftError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.max_stability_loss_per_use.is_finite() || self.max_stability_loss_per_use < 0.0 {
            return Err(CraftError::InvalidConfig(format!(
                "maxStabilityLossPerUse must be non-negative, got {}",
                self.max_stability_loss_per_use
            )));
        }
        if let Some(limit) = self.max_toxicity {
            if !limit.is_finite() || limit < 0.0 {
                return Err(CraftError::InvalidConfig(format!(
                    "maxToxicity must be non-negative, got {}",
                    limit
                )));
            }
        }
        for (condition, modifiers) in &self.conditions {
            for multiplier in [modifiers.pool_cost, modifiers.stability_cost] {
                if !multiplier.is_finite() || multiplier < 0.0 {
                    return Err(CraftError::InvalidConfig(format!(
                        "cost multiplier for {:?} must be non-negative, got {}",
                        condition, multiplier
                    )));
                }
            }
        }
        Ok(())
    }
}

/// How the condition moves from one turn to the next.
pub trait ConditionDrift {
    /// Condition for `turn`, given the condition of the turn before it.
    fn next(&self, current: Condition, turn: u32) -> Condition;
}

/// Built-in drift policies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriftPolicy {
    /// The condition never changes.
    Static,
    /// One step toward neutral every turn.
    #[default]
    Revert,
    /// Host forecast: `upcoming[i]` is the condition of turn
    /// `from_turn + 1 + i`. Turns past the forecast revert toward neutral.
    Forecast {
        from_turn: u32,
        upcoming: Vec<Condition>,
    },
}

impl ConditionDrift for DriftPolicy {
    fn next(&self, current: Condition, turn: u32) -> Condition {
        match self {
            DriftPolicy::Static => current,
            DriftPolicy::Revert => current.toward_neutral(),
            DriftPolicy::Forecast {
                from_turn,
                upcoming,
            } => turn
                .checked_sub(from_turn + 1)
                .and_then(|index| upcoming.get(index as usize))
                .copied()
                .unwrap_or_else(|| current.toward_neutral()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modifiers_are_neutral() {
        let rules = CraftRules::default();
        let modifiers = rules.condition(Condition::VeryNegative);
        assert_eq!(modifiers.pool_cost, 1.0);
        assert_eq!(modifiers.stability_cost, 1.0);
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"{
            "completionTarget": 60,
            "maxTurns": 12,
            "conditions": {"veryPositive": {"poolCost": 0.5}}
        }"#;
        let rules = CraftRules::from_json(json).unwrap();
        assert_eq!(rules.completion_target, 60.0);
        assert_eq!(rules.perfection_cap, 100.0);
        assert_eq!(rules.max_turns, Some(12));
        assert_eq!(rules.max_stability_loss_per_use, 1.0);
        assert_eq!(rules.condition(Condition::VeryPositive).pool_cost, 0.5);
        assert_eq!(rules.condition(Condition::VeryPositive).stability_cost, 1.0);
    }

    #[test]
    fn test_rules_validation() {
        let rules = CraftRules::new(0.0, 10.0);
        assert!(matches!(rules.validate(), Err(CraftError::InvalidConfig(_))));
        let rules = CraftRules::default().with_max_stability_loss(-1.0);
        assert!(rules.validate().is_err());
        let rules = CraftRules::default().with_condition(
            Condition::Negative,
            ConditionModifiers {
                pool_cost: f64::NAN,
                stability_cost: 1.0,
            },
        );
        assert!(matches!(rules.validate(), Err(CraftError::InvalidConfig(_))));
        let rules = CraftRules::default().with_max_toxicity(f64::INFINITY);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_static_and_revert() {
        assert_eq!(DriftPolicy::Static.next(Condition::VeryPositive, 1), Condition::VeryPositive);
        assert_eq!(DriftPolicy::Revert.next(Condition::VeryPositive, 1), Condition::Positive);
    }

    #[test]
    fn test_forecast_then_revert() {
        let drift = DriftPolicy::Forecast {
            from_turn: 2,
            upcoming: vec![Condition::Negative, Condition::VeryPositive],
        };
        assert_eq!(drift.next(Condition::Neutral, 3), Condition::Negative);
        assert_eq!(drift.next(Condition::Negative, 4), Condition::VeryPositive);
        assert_eq!(drift.next(Condition::VeryPositive, 5), Condition::Positive);
        // turns before the forecast window fall back as well
        assert_eq!(drift.next(Condition::Negative, 1), Condition::Neutral);
    }
}
