//! Finalized technique costs.
//!
//! A cost passes through a fixed sequence of phases:
//!
//! ```text
//! base → condition multiplier → buff percentage → mastery tiers
//! ```
//!
//! The order matters for numeric parity with the host and must not be
//! changed. Each phase's result is kept so the display layer can show how
//! the final number came about.

use crate::catalog::{BuffCost, TierAdjust};
use serde::{Deserialize, Serialize};

/// A phase of cost finalization, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostPhase {
    Base,
    Condition,
    Buffs,
    Mastery,
}

/// One finalized cost with its phase breakdown.
///
/// # Examples
///
/// ```rust
/// use craftsage::cost::{CostLine, CostPhase};
/// use craftsage::TierAdjust;
///
/// // base 10, condition x1.5, buffs -25%, mastery -1
/// let line = CostLine::finalize(10.0, 1.5, -25.0, [TierAdjust::Add(-1.0)]);
/// assert_eq!(line.value, 10.25);
/// assert_eq!(line.steps[1], (CostPhase::Condition, 15.0));
/// assert_eq!(line.steps[2], (CostPhase::Buffs, 11.25));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    /// The final value, never negative.
    pub value: f64,
    /// Value after each phase, in application order.
    pub steps: Vec<(CostPhase, f64)>,
}

impl CostLine {
    /// Run a base cost through every phase.
    ///
    /// `buff_percent` is the summed buff percentage (`-20.0` means 20%
    /// cheaper). The result is floored at zero after the last phase.
    pub fn finalize(
        base: f64,
        condition_multiplier: f64,
        buff_percent: f64,
        mastery: impl IntoIterator<Item = TierAdjust>,
    ) -> Self {
        let mut steps = Vec::with_capacity(4);
        steps.push((CostPhase::Base, base));

        let mut value = base * condition_multiplier;
        steps.push((CostPhase::Condition, value));

        value *= 1.0 + buff_percent / 100.0;
        steps.push((CostPhase::Buffs, value));

        for adjust in mastery {
            value = adjust.apply(value);
        }
        value = value.max(0.0);
        steps.push((CostPhase::Mastery, value));

        Self { value, steps }
    }

    /// A cost that no phase touches.
    pub fn fixed(value: f64) -> Self {
        Self {
            value,
            steps: vec![(CostPhase::Base, value)],
        }
    }

    /// Value after a given phase, if recorded.
    pub fn after(&self, phase: CostPhase) -> Option<f64> {
        self.steps
            .iter()
            .find(|(step, _)| *step == phase)
            .map(|(_, value)| *value)
    }
}

/// Every resource a technique will consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub pool: CostLine,
    pub stability: CostLine,
    /// Toxicity added on use.
    pub toxicity: f64,
    /// Buff stacks consumed on use.
    pub buff: Option<BuffCost>,
}
