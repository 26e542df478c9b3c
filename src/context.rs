//! Session context shared by the resolver, transition engine and search.
//!
//! A `CraftContext` bundles the read-only pieces of a session: the
//! catalog, the craft rules, the parity strategy and the condition drift
//! policy. It holds no mutable state and is borrowed by every search frame.

use crate::catalog::Catalog;
use crate::effect::Caps;
use crate::error::Result;
use crate::native::ParityStrategy;
use crate::rules::{ConditionDrift, CraftRules};
use crate::state::{CraftOutcome, CraftState};
use crate::stats::StatSheet;
use crate::variables::VariableBag;

/// Read-only collaborators for one session.
#[derive(Clone, Copy)]
pub struct CraftContext<'a> {
    pub catalog: &'a Catalog,
    pub rules: &'a CraftRules,
    pub model: &'a dyn ParityStrategy,
    pub drift: &'a dyn ConditionDrift,
}

impl<'a> CraftContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        rules: &'a CraftRules,
        model: &'a dyn ParityStrategy,
        drift: &'a dyn ConditionDrift,
    ) -> Self {
        Self {
            catalog,
            rules,
            model,
            drift,
        }
    }

    /// Completion and perfection caps for a state.
    pub fn caps(&self, state: &CraftState) -> Caps {
        Caps {
            completion: self.model.completion_cap(state, self.rules),
            perfection: self.model.perfection_cap(state, self.rules),
        }
    }

    /// Variables visible to formulas in `state`.
    pub fn variables(&self, state: &CraftState) -> Result<VariableBag> {
        Ok(StatSheet::resolve(state, self.catalog)?.variables().clone())
    }

    /// Lifecycle classification.
    ///
    /// Failed wins over Completed: a craft that collapses on the turn it
    /// would have finished is still a failure.
    pub fn classify(&self, state: &CraftState) -> CraftOutcome {
        if state.stability <= 0.0 {
            CraftOutcome::Failed
        } else if state.completion >= self.model.completion_cap(state, self.rules) {
            CraftOutcome::Completed
        } else if self
            .rules
            .max_turns
            .is_some_and(|limit| state.turn >= limit)
        {
            CraftOutcome::Exhausted
        } else {
            CraftOutcome::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::LocalModel;
    use crate::rules::DriftPolicy;

    #[test]
    fn test_classify() {
        let catalog = Catalog::new();
        let rules = CraftRules::new(50.0, 50.0).with_max_turns(10);
        let drift = DriftPolicy::Static;
        let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);

        let mut state = CraftState::new(10.0, 5.0);
        assert_eq!(ctx.classify(&state), CraftOutcome::InProgress);

        state.completion = 50.0;
        assert_eq!(ctx.classify(&state), CraftOutcome::Completed);

        state.stability = 0.0;
        assert_eq!(ctx.classify(&state), CraftOutcome::Failed);

        let mut state = CraftState::new(10.0, 5.0);
        state.turn = 10;
        assert_eq!(ctx.classify(&state), CraftOutcome::Exhausted);
    }

    #[test]
    fn test_caps_follow_rules() {
        let catalog = Catalog::new();
        let rules = CraftRules::new(80.0, 30.0);
        let drift = DriftPolicy::Revert;
        let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
        let caps = ctx.caps(&CraftState::new(1.0, 1.0));
        assert_eq!(caps.completion, 80.0);
        assert_eq!(caps.perfection, 30.0);
    }
}
