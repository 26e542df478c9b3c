//! State transition engine.
//!
//! A technique use forks the craft into two weighted branches:
//!
//! ```text
//!                  ┌─ success (p)     : costs → effects → end of turn
//! state ─ resolve ─┤
//!                  └─ failure (1 - p) : costs → effects without progress → end of turn
//! ```
//!
//! Costs are paid on both branches. The failure branch withholds every
//! completion and perfection gain in the batch while stability changes,
//! buff changes and other side effects still apply. Both branches are
//! always produced, even when one of them carries zero weight.

use crate::catalog::{BuffDecay, Technique};
use crate::context::CraftContext;
use crate::cost::CostBreakdown;
use crate::effect::{apply_batch, EffectContext};
use crate::error::Result;
use crate::ids::BuffId;
use crate::state::{CraftOutcome, CraftState};
use crate::technique::{resolve, ResolvedTechnique};
use std::collections::BTreeSet;

/// Both outcomes of one technique use.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub success: CraftState,
    pub failure: CraftState,
    /// Weight of the success branch; the failure branch weighs `1 - p`.
    pub success_chance: f64,
    pub cost: CostBreakdown,
}

impl Transition {
    /// Weight of the failure branch.
    pub fn failure_chance(&self) -> f64 {
        1.0 - self.success_chance
    }

    /// Branches with their weights, success first.
    pub fn branches(&self) -> [(&CraftState, f64); 2] {
        [
            (&self.success, self.success_chance),
            (&self.failure, self.failure_chance()),
        ]
    }
}

/// Lifecycle classification of a state.
pub fn classify(state: &CraftState, ctx: &CraftContext<'_>) -> CraftOutcome {
    ctx.classify(state)
}

/// Apply a technique to a state.
///
/// Fails with `ActionUnavailable` when the technique is not legal, including
/// `Terminal` for finished crafts. The input state is never modified.
///
/// # Examples
///
/// ```rust
/// use craftsage::native::LocalModel;
/// use craftsage::transition::step;
/// use craftsage::*;
///
/// let catalog = Catalog::new().with_technique(
///     Technique::new("simple_fusion", TechniqueType::Fusion)
///         .with_pool_cost(10.0)
///         .with_stability_cost(2.0)
///         .with_success_chance(0.5)
///         .with_effect(Effect::completion(Scaling::flat(20.0))),
/// );
/// let rules = CraftRules::default();
/// let drift = DriftPolicy::Static;
/// let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
///
/// let state = CraftState::new(20.0, 10.0);
/// let transition = step(&catalog.techniques()[0], &state, &ctx).unwrap();
///
/// assert_eq!(transition.success.completion, 20.0);
/// assert_eq!(transition.failure.completion, 0.0);
/// // stability is paid either way
/// assert_eq!(transition.success.stability, 8.0);
/// assert_eq!(transition.failure.stability, 8.0);
/// assert_eq!(transition.success.turn, 1);
/// ```
pub fn step(technique: &Technique, state: &CraftState, ctx: &CraftContext<'_>) -> Result<Transition> {
    let resolved = resolve(technique, state, ctx)?;
    let paid = pay(&resolved, state, ctx);
    let variables = ctx.variables(&paid)?;

    let mut effects = EffectContext {
        catalog: ctx.catalog,
        model: ctx.model,
        variables: &variables,
        caps: ctx.caps(&paid),
        suppress_progress: false,
    };
    let success = apply_batch(&resolved.batch, &paid, &effects)?;
    effects.suppress_progress = true;
    let failure = apply_batch(&resolved.batch, &paid, &effects)?;

    Ok(Transition {
        success: end_turn(success.state, technique, state, &success.fired, ctx)?,
        failure: end_turn(failure.state, technique, state, &failure.fired, ctx)?,
        success_chance: resolved.success_chance,
        cost: resolved.cost,
    })
}

/// Deduct every cost of a resolved technique.
fn pay(resolved: &ResolvedTechnique<'_>, state: &CraftState, ctx: &CraftContext<'_>) -> CraftState {
    let mut next = state.clone();
    next.pool = (next.pool - resolved.cost.pool.value).max(0.0);
    next.stability = (next.stability - resolved.cost.stability.value).max(0.0);
    next.toxicity += resolved.cost.toxicity;
    if let Some(cost) = &resolved.cost.buff {
        next.active_buffs.remove(&cost.buff, cost.stacks);
    }
    if !resolved.technique.no_max_stability_loss {
        next.max_stability = (next.max_stability - ctx.rules.max_stability_loss_per_use).max(0.0);
        next.stability = next.stability.min(next.max_stability);
    }
    next
}

/// Buff decay, cooldowns, condition drift and the turn counter.
fn end_turn(
    mut next: CraftState,
    technique: &Technique,
    before: &CraftState,
    fired: &BTreeSet<BuffId>,
    ctx: &CraftContext<'_>,
) -> Result<CraftState> {
    for buff in fired {
        if ctx.catalog.buff(buff)?.decay == BuffDecay::OnTrigger {
            next.active_buffs.remove(buff, 1);
        }
    }

    // buffs created during this turn do not decay until the next one
    let mut decaying = Vec::new();
    for entry in next.active_buffs.iter() {
        if !before.active_buffs.contains(&entry.buff) {
            continue;
        }
        if let BuffDecay::PerTurn(stacks) = ctx.catalog.buff(&entry.buff)?.decay {
            decaying.push((entry.buff.clone(), stacks));
        }
    }
    for (buff, stacks) in decaying {
        next.active_buffs.remove(&buff, stacks);
    }

    next.cooldowns = next
        .cooldowns
        .into_iter()
        .filter(|(id, _)| *id != technique.id)
        .filter_map(|(id, turns)| turns.checked_sub(1).filter(|t| *t > 0).map(|t| (id, t)))
        .collect();
    if technique.cooldown > 0 {
        next.cooldowns.insert(technique.id.clone(), technique.cooldown);
    }

    next.turn = before.turn + 1;
    next.condition = ctx.drift.next(before.condition, next.turn);
    Ok(next)
}
