//! Formula evaluator.
//!
//! A `Scaling` is the host's amount expression: a base value, plus an
//! optional stat reference, plus an optional named variable, optionally
//! capped by another `Scaling`. Evaluation is pure and never fails; missing
//! variables resolve to zero.

use crate::ids::StatId;
use crate::variables::VariableBag;
use serde::{Deserialize, Serialize};

fn one() -> f64 {
    1.0
}

fn is_one(value: &f64) -> bool {
    *value == 1.0
}

/// A reference to a variable with a coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    /// The referenced variable.
    pub id: StatId,
    /// Coefficient applied to the looked-up value.
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub multiplier: f64,
}

impl Term {
    /// A term with multiplier `1.0`.
    pub fn new(id: impl Into<StatId>) -> Self {
        Self {
            id: id.into(),
            multiplier: 1.0,
        }
    }

    /// A term with an explicit multiplier.
    pub fn scaled(id: impl Into<StatId>, multiplier: f64) -> Self {
        Self {
            id: id.into(),
            multiplier,
        }
    }

    fn value(&self, variables: &VariableBag) -> f64 {
        variables.get_id(&self.id) * self.multiplier
    }
}

/// A scaling expression.
///
/// # Examples
///
/// ```rust
/// use craftsage::{Scaling, VariableBag, evaluate};
///
/// // 10 + 1.5 * intensity, capped at 50
/// let amount = Scaling::flat(10.0)
///     .with_stat("intensity", 1.5)
///     .with_cap(Scaling::flat(50.0));
///
/// let mut vars = VariableBag::new();
/// vars.set("intensity", 20.0);
/// assert_eq!(evaluate(&amount, &vars), 40.0);
///
/// vars.set("intensity", 40.0);
/// assert_eq!(evaluate(&amount, &vars), 50.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaling {
    /// Constant part.
    #[serde(default)]
    pub base_value: f64,
    /// Optional stat contribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_reference: Option<Term>,
    /// Optional named-variable contribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_variable: Option<Term>,
    /// Optional upper bound, itself a scaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<Box<Scaling>>,
}

impl Scaling {
    /// A constant amount.
    pub fn flat(value: f64) -> Self {
        Self {
            base_value: value,
            ..Self::default()
        }
    }

    /// An amount of `multiplier * stat`.
    pub fn stat(id: impl Into<StatId>, multiplier: f64) -> Self {
        Self::flat(0.0).with_stat(id, multiplier)
    }

    /// Set the stat reference.
    pub fn with_stat(mut self, id: impl Into<StatId>, multiplier: f64) -> Self {
        self.stat_reference = Some(Term::scaled(id, multiplier));
        self
    }

    /// Set the named-variable reference.
    pub fn with_variable(mut self, id: impl Into<StatId>, multiplier: f64) -> Self {
        self.named_variable = Some(Term::scaled(id, multiplier));
        self
    }

    /// Set the cap.
    pub fn with_cap(mut self, cap: Scaling) -> Self {
        self.cap = Some(Box::new(cap));
        self
    }

    /// Evaluate this scaling. See [`evaluate`].
    pub fn evaluate(&self, variables: &VariableBag) -> f64 {
        evaluate(self, variables)
    }
}

/// Evaluate a scaling against a variable bag.
///
/// `base + stat + variable`, then clamped to the evaluated cap if one is
/// present. Missing references contribute `0.0`.
pub fn evaluate(scaling: &Scaling, variables: &VariableBag) -> f64 {
    let mut value = scaling.base_value;
    if let Some(term) = &scaling.stat_reference {
        value += term.value(variables);
    }
    if let Some(term) = &scaling.named_variable {
        value += term.value(variables);
    }
    match &scaling.cap {
        Some(cap) => value.min(evaluate(cap, variables)),
        None => value,
    }
}
