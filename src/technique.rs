//! Technique resolver.
//!
//! Turns a technique definition plus the current state into finalized
//! costs, a success chance and the ordered effect batch it would trigger,
//! and decides whether the technique may be used at all.

use crate::catalog::{Technique, TechniqueType};
use crate::context::CraftContext;
use crate::cost::{CostBreakdown, CostLine};
use crate::effect::TriggeredEffect;
use crate::error::{CraftError, Result, Unavailability};
use crate::state::CraftState;
use crate::variables::{names, VariableBag};
use tracing::debug;

/// A technique resolved against a specific state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTechnique<'t> {
    pub technique: &'t Technique,
    pub cost: CostBreakdown,
    /// Finalized chance in `[0, 1]`.
    pub success_chance: f64,
    /// Technique effects first, then buff triggers in activation order.
    pub batch: Vec<TriggeredEffect>,
}

/// Finalize every cost of a technique.
pub fn finalize_cost(
    technique: &Technique,
    state: &CraftState,
    variables: &VariableBag,
    ctx: &CraftContext<'_>,
) -> CostBreakdown {
    let condition = ctx.rules.condition(state.condition);
    let tiers = technique.unlocked_tiers();

    let pool = CostLine::finalize(
        technique.pool_cost,
        condition.pool_cost,
        variables.get(names::POOL_COST_PERCENTAGE),
        tiers.iter().filter_map(|tier| tier.pool_cost),
    );
    let stability = CostLine::finalize(
        technique.stability_cost,
        condition.stability_cost,
        variables.get(names::STABILITY_COST_PERCENTAGE),
        tiers.iter().filter_map(|tier| tier.stability_cost),
    );

    CostBreakdown {
        pool,
        stability,
        toxicity: technique.toxicity_cost.unwrap_or(0.0).max(0.0),
        buff: technique.buff_cost.clone(),
    }
}

/// Finalized success chance: mastery-adjusted base plus buff bonus,
/// clamped to `[0, 1]`.
pub fn success_chance(technique: &Technique, variables: &VariableBag) -> f64 {
    let base = technique
        .unlocked_tiers()
        .iter()
        .filter_map(|tier| tier.success_chance)
        .fold(technique.success_chance, |chance, adjust| adjust.apply(chance));
    (base + variables.get(names::SUCCESS_CHANCE_BONUS)).clamp(0.0, 1.0)
}

/// Check legality with precomputed variables and cost.
pub(crate) fn check_legal_with(
    technique: &Technique,
    state: &CraftState,
    cost: &CostBreakdown,
    ctx: &CraftContext<'_>,
) -> Result<()> {
    let local = local_verdict(technique, state, cost, ctx);
    let allowed = ctx.model.precheck(technique, state, local.is_ok());
    local?;
    if !allowed {
        return Err(CraftError::unavailable(
            &technique.id,
            Unavailability::HostRejected,
        ));
    }
    Ok(())
}

fn local_verdict(
    technique: &Technique,
    state: &CraftState,
    cost: &CostBreakdown,
    ctx: &CraftContext<'_>,
) -> Result<()> {
    let fail = |reason| Err(CraftError::unavailable(&technique.id, reason));

    if ctx.classify(state).is_terminal() {
        return fail(Unavailability::Terminal);
    }
    let cooldown = state.cooldown(&technique.id);
    if cooldown > 0 {
        return fail(Unavailability::OnCooldown(cooldown));
    }
    if let Some(required) = technique.condition_requirement {
        if state.condition != required {
            return fail(Unavailability::ConditionMismatch);
        }
    }
    for requirement in [&technique.buff_requirement, &technique.buff_cost]
        .into_iter()
        .flatten()
    {
        if state.active_buffs.stacks(&requirement.buff) < requirement.stacks {
            return fail(Unavailability::MissingBuff);
        }
    }
    if state.pool < cost.pool.value {
        return fail(Unavailability::InsufficientPool);
    }
    if state.stability < cost.stability.value {
        return fail(Unavailability::InsufficientStability);
    }
    if cost.toxicity > 0.0 {
        if let Some(limit) = ctx.model.max_toxicity(ctx.rules) {
            if state.toxicity + cost.toxicity > limit {
                return fail(Unavailability::ToxicityLimit);
            }
        }
    }
    Ok(())
}

/// Check whether a technique may be used.
///
/// Fails with `ActionUnavailable` naming the first unmet condition. Any
/// other error (unknown buff, modifier cycle) means the state itself could
/// not be evaluated.
pub fn check_legal(technique: &Technique, state: &CraftState, ctx: &CraftContext<'_>) -> Result<()> {
    let variables = ctx.variables(state)?;
    let cost = finalize_cost(technique, state, &variables, ctx);
    check_legal_with(technique, state, &cost, ctx)
}

/// Every usable technique, in catalog declaration order.
pub fn legal_actions<'c>(state: &CraftState, ctx: &CraftContext<'c>) -> Result<Vec<&'c Technique>> {
    let variables = ctx.variables(state)?;
    let mut legal = Vec::new();
    for technique in ctx.catalog.techniques() {
        let cost = finalize_cost(technique, state, &variables, ctx);
        match check_legal_with(technique, state, &cost, ctx) {
            Ok(()) => legal.push(technique),
            Err(CraftError::ActionUnavailable { technique, reason }) => {
                debug!(%technique, %reason, "technique excluded");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(legal)
}

/// Effect batch for a technique: its own effects scaled by mastery, then
/// each active buff's `Always` and type-matched effects.
pub(crate) fn effect_batch(
    technique: &Technique,
    state: &CraftState,
    ctx: &CraftContext<'_>,
) -> Result<Vec<TriggeredEffect>> {
    let multiplier = technique.effect_multiplier();
    let mut batch: Vec<TriggeredEffect> = technique
        .effects
        .iter()
        .map(|effect| TriggeredEffect::own(effect.clone(), multiplier))
        .collect();
    batch.extend(buff_triggers(technique.kind, state, ctx)?);
    Ok(batch)
}

fn buff_triggers(
    kind: TechniqueType,
    state: &CraftState,
    ctx: &CraftContext<'_>,
) -> Result<Vec<TriggeredEffect>> {
    let mut triggered = Vec::new();
    for entry in state.active_buffs.iter() {
        let buff = ctx.catalog.buff(&entry.buff)?;
        triggered.extend(
            buff.triggered_effects(kind)
                .map(|effect| TriggeredEffect::from_buff(effect.clone(), buff.id.clone())),
        );
    }
    Ok(triggered)
}

/// Resolve a legal technique.
///
/// # Examples
///
/// ```rust
/// use craftsage::native::LocalModel;
/// use craftsage::technique::resolve;
/// use craftsage::*;
///
/// let catalog = Catalog::new().with_technique(
///     Technique::new("fusion", TechniqueType::Fusion)
///         .with_pool_cost(10.0)
///         .with_success_chance(0.75)
///         .with_effect(Effect::completion(Scaling::stat("intensity", 1.0))),
/// );
/// let rules = CraftRules::default();
/// let drift = DriftPolicy::Static;
/// let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
///
/// let state = CraftState::new(20.0, 10.0).with_stat("intensity", 12.0);
/// let resolved = resolve(&catalog.techniques()[0], &state, &ctx).unwrap();
/// assert_eq!(resolved.cost.pool.value, 10.0);
/// assert_eq!(resolved.success_chance, 0.75);
/// assert_eq!(resolved.batch.len(), 1);
/// ```
pub fn resolve<'t>(
    technique: &'t Technique,
    state: &CraftState,
    ctx: &CraftContext<'_>,
) -> Result<ResolvedTechnique<'t>> {
    let variables = ctx.variables(state)?;
    let cost = finalize_cost(technique, state, &variables, ctx);
    check_legal_with(technique, state, &cost, ctx)?;
    Ok(ResolvedTechnique {
        technique,
        cost,
        success_chance: success_chance(technique, &variables),
        batch: effect_batch(technique, state, ctx)?,
    })
}
