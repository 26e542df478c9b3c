//! Expected-value search.
//!
//! The search tree alternates two kinds of nodes:
//!
//! ```text
//! decision node (state)  : max over legal techniques
//!   └─ chance node (use) : p · value(success) + (1 - p) · value(failure)
//!        └─ decision node ...
//! ```
//!
//! Leaves are terminal states or states at the depth limit; they are valued
//! by [`ScoringWeights::score`]. A failed leaf scores `-failure_risk`, so
//! the expected penalty of a plan is `failure_risk × P(failure)`.
//!
//! The tree grows as `O((2·|legal|)^depth)`, which is why depth is capped
//! and caller-tunable. Branches with zero weight are not expanded.

use crate::catalog::Technique;
use crate::context::CraftContext;
use crate::cost::CostBreakdown;
use crate::error::{CraftError, Result};
use crate::ids::TechniqueId;
use crate::state::{CraftOutcome, CraftState};
use crate::technique::legal_actions;
use crate::transition::{step, Transition};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, error};

/// Deepest lookahead accepted by [`SearchConfig::validate`].
pub const MAX_DEPTH: u8 = 6;

/// Leaf scoring weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    /// Per point of capped completion.
    pub completion: f64,
    /// Per point of capped perfection.
    pub perfection: f64,
    /// Penalty per point gained past a cap.
    pub overflow: f64,
    /// Penalty for a failed craft.
    pub failure_risk: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            completion: 1.0,
            perfection: 1.0,
            overflow: 0.5,
            failure_risk: 100.0,
        }
    }
}

impl ScoringWeights {
    /// Value of a leaf state.
    pub fn score(&self, state: &CraftState, ctx: &CraftContext<'_>) -> f64 {
        if ctx.classify(state) == CraftOutcome::Failed {
            return -self.failure_risk;
        }
        let caps = ctx.caps(state);
        self.completion * state.completion.min(caps.completion)
            + self.perfection * state.perfection.min(caps.perfection)
            - self.overflow * (state.wasted_completion + state.wasted_perfection)
    }
}

fn default_depth() -> u8 {
    3
}

fn default_alternatives() -> usize {
    3
}

/// Search configuration, resolved by the caller before each invocation.
///
/// # Examples
///
/// ```rust
/// use craftsage::search::SearchConfig;
///
/// let config = SearchConfig::from_json(r#"{"depth": 2, "weights": {"overflow": 0}}"#).unwrap();
/// assert_eq!(config.depth, 2);
/// assert_eq!(config.weights.overflow, 0.0);
/// assert_eq!(config.weights.failure_risk, 100.0);
/// assert_eq!(config.alternatives, 3);
///
/// assert!(SearchConfig::default().with_depth(7).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Plies searched after the root action; `0` is greedy.
    #[serde(default = "default_depth")]
    pub depth: u8,
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Number of runner-up plans to return.
    #[serde(default = "default_alternatives")]
    pub alternatives: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            weights: ScoringWeights::default(),
            alternatives: default_alternatives(),
        }
    }
}

impl SearchConfig {
    /// Parse a configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SearchConfig =
            serde_json::from_str(json).map_err(|e| CraftError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_alternatives(mut self, alternatives: usize) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth > MAX_DEPTH {
            return Err(CraftError::InvalidConfig(format!(
                "depth {} exceeds the maximum of {}",
                self.depth, MAX_DEPTH
            )));
        }
        let weights = [
            ("completion", self.weights.completion),
            ("perfection", self.weights.perfection),
            ("overflow", self.weights.overflow),
            ("failureRisk", self.weights.failure_risk),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(CraftError::InvalidConfig(format!(
                    "weight {} is not finite",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// One ranked root action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub technique: TechniqueId,
    /// The root technique followed by the best continuation along the more
    /// likely branch.
    pub sequence: Vec<TechniqueId>,
    pub expected_score: f64,
    /// Expected completion change from the root action.
    pub expected_completion: f64,
    /// Expected perfection change from the root action.
    pub expected_perfection: f64,
    /// Expected stability change from the root action.
    pub expected_stability: f64,
    pub cost: CostBreakdown,
    pub success_chance: f64,
    pub success_state: CraftState,
    pub failure_state: CraftState,
}

/// Best plan and runners-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub best: ActionPlan,
    pub alternatives: Vec<ActionPlan>,
    /// Decision and leaf nodes evaluated.
    pub nodes_visited: u64,
}

/// Rank every legal action from `state`.
///
/// Returns `Ok(None)` for terminal states and for states where no technique
/// is legal. Any error met in any branch aborts the whole recommendation;
/// partial results are never returned.
///
/// # Examples
///
/// ```rust
/// use craftsage::native::LocalModel;
/// use craftsage::search::{recommend, SearchConfig};
/// use craftsage::*;
///
/// let catalog = Catalog::new().with_technique(
///     Technique::new("simple_fusion", TechniqueType::Fusion)
///         .with_pool_cost(10.0)
///         .with_stability_cost(2.0)
///         .with_effect(Effect::completion(Scaling::flat(15.0))),
/// );
/// let rules = CraftRules::default();
/// let drift = DriftPolicy::Static;
/// let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
///
/// let state = CraftState::new(20.0, 5.0);
/// let config = SearchConfig::default().with_depth(1);
/// let plan = recommend(&state, &ctx, &config).unwrap().unwrap().best;
///
/// assert_eq!(plan.technique.as_str(), "simple_fusion");
/// assert_eq!(plan.expected_completion, 15.0);
/// assert_eq!(plan.success_state.pool, 10.0);
/// assert_eq!(plan.success_state.stability, 3.0);
/// ```
pub fn recommend(
    state: &CraftState,
    ctx: &CraftContext<'_>,
    config: &SearchConfig,
) -> Result<Option<Recommendation>> {
    let result = run(state, ctx, config);
    if let Err(err) = &result {
        error!("recommendation aborted: {}", err);
    }
    result
}

fn run(
    state: &CraftState,
    ctx: &CraftContext<'_>,
    config: &SearchConfig,
) -> Result<Option<Recommendation>> {
    config.validate()?;
    ctx.rules.validate()?;
    state.validate(ctx.catalog)?;

    let outcome = ctx.classify(state);
    if outcome.is_terminal() {
        debug!("state is terminal ({:?}), nothing to recommend", outcome);
        return Ok(None);
    }

    let mut search = Search {
        ctx,
        weights: &config.weights,
        nodes: 1,
    };
    let actions = legal_actions(state, ctx)?;
    debug!(
        "searching {} legal actions at depth {}",
        actions.len(),
        config.depth
    );

    let mut ranked = Vec::with_capacity(actions.len());
    for technique in actions {
        let transition = step(technique, state, ctx)?;
        let chance = search.chance(&transition, config.depth)?;
        let index = ctx.catalog.position(&technique.id).unwrap_or(usize::MAX);
        ranked.push((index, plan(technique, state, transition, chance)));
    }
    ranked.sort_by(|(ia, a), (ib, b)| {
        rank(a.expected_score, a.success_chance, *ia)
            .cmp_to(&rank(b.expected_score, b.success_chance, *ib))
    });

    let mut plans = ranked.into_iter().map(|(_, plan)| plan);
    let Some(best) = plans.next() else {
        debug!("no legal action");
        return Ok(None);
    };
    let alternatives: Vec<_> = plans.take(config.alternatives).collect();
    debug!(
        "best action {} (expected score {:.3}), {} nodes visited",
        best.technique, best.expected_score, search.nodes
    );

    Ok(Some(Recommendation {
        best,
        alternatives,
        nodes_visited: search.nodes,
    }))
}

/// Ordering key: higher score, then higher success chance, then earlier
/// declaration.
struct Rank {
    score: f64,
    chance: f64,
    index: usize,
}

fn rank(score: f64, chance: f64, index: usize) -> Rank {
    Rank {
        score,
        chance,
        index,
    }
}

impl Rank {
    /// `Less` when `self` ranks ahead of `other`.
    fn cmp_to(&self, other: &Rank) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(other.chance.total_cmp(&self.chance))
            .then(self.index.cmp(&other.index))
    }
}

/// Value of a chance node with its principal continuation.
struct ChanceValue {
    score: f64,
    line: Vec<TechniqueId>,
}

struct Search<'a, 'c> {
    ctx: &'a CraftContext<'c>,
    weights: &'a ScoringWeights,
    nodes: u64,
}

impl Search<'_, '_> {
    /// Expected value of a technique use whose children get `depth` more
    /// plies.
    fn chance(&mut self, transition: &Transition, depth: u8) -> Result<ChanceValue> {
        let mut score = 0.0;
        let mut likely: Option<(f64, Vec<TechniqueId>)> = None;
        for (child, weight) in transition.branches() {
            if weight <= 0.0 {
                continue;
            }
            let (value, line) = self.decision(child, depth)?;
            score += weight * value;
            if likely.as_ref().map_or(true, |(w, _)| weight > *w) {
                likely = Some((weight, line));
            }
        }
        Ok(ChanceValue {
            score,
            line: likely.map(|(_, line)| line).unwrap_or_default(),
        })
    }

    /// Best expected value reachable from a state.
    fn decision(&mut self, state: &CraftState, depth: u8) -> Result<(f64, Vec<TechniqueId>)> {
        self.nodes += 1;
        if depth == 0 || self.ctx.classify(state).is_terminal() {
            return Ok((self.weights.score(state, self.ctx), Vec::new()));
        }
        let actions = legal_actions(state, self.ctx)?;
        if actions.is_empty() {
            return Ok((self.weights.score(state, self.ctx), Vec::new()));
        }

        let mut best: Option<(Rank, TechniqueId, Vec<TechniqueId>)> = None;
        for (index, technique) in actions.into_iter().enumerate() {
            let transition = step(technique, state, self.ctx)?;
            let value = self.chance(&transition, depth - 1)?;
            let candidate = rank(value.score, transition.success_chance, index);
            let better = best
                .as_ref()
                .map_or(true, |(current, _, _)| candidate.cmp_to(current) == Ordering::Less);
            if better {
                best = Some((candidate, technique.id.clone(), value.line));
            }
        }

        Ok(match best {
            Some((ranked, id, mut line)) => {
                line.insert(0, id);
                (ranked.score, line)
            }
            None => (self.weights.score(state, self.ctx), Vec::new()),
        })
    }
}

fn plan(
    technique: &Technique,
    state: &CraftState,
    transition: Transition,
    value: ChanceValue,
) -> ActionPlan {
    let p = transition.success_chance;
    let expected = |field: fn(&CraftState) -> f64| {
        p * field(&transition.success) + (1.0 - p) * field(&transition.failure) - field(state)
    };
    let expected_completion = expected(|s| s.completion);
    let expected_perfection = expected(|s| s.perfection);
    let expected_stability = expected(|s| s.stability);

    let mut sequence = vec![technique.id.clone()];
    sequence.extend(value.line);

    ActionPlan {
        technique: technique.id.clone(),
        sequence,
        expected_score: value.score,
        expected_completion,
        expected_perfection,
        expected_stability,
        cost: transition.cost,
        success_chance: p,
        success_state: transition.success,
        failure_state: transition.failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, TechniqueType};
    use crate::effect::Effect;
    use crate::native::LocalModel;
    use crate::rules::{ConditionModifiers, CraftRules, DriftPolicy};
    use crate::state::Condition;
    use crate::scaling::Scaling;

    fn search(
        catalog: &Catalog,
        state: &CraftState,
        config: &SearchConfig,
    ) -> Result<Option<Recommendation>> {
        let rules = CraftRules::default();
        let drift = DriftPolicy::Static;
        let ctx = CraftContext::new(catalog, &rules, &LocalModel, &drift);
        recommend(state, &ctx, config)
    }

    fn greedy() -> SearchConfig {
        SearchConfig::default().with_depth(0)
    }

    fn gamble(chance: f64) -> Technique {
        Technique::new("gamble", TechniqueType::Fusion)
            .with_stability_cost(2.0)
            .with_success_chance(chance)
            .with_effect(Effect::completion(Scaling::flat(20.0)))
    }

    #[test]
    fn test_simple_fusion_scenario() {
        let catalog = Catalog::new().with_technique(
            Technique::new("simple_fusion", TechniqueType::Fusion)
                .with_pool_cost(10.0)
                .with_stability_cost(2.0)
                .with_effect(Effect::completion(Scaling::flat(15.0))),
        );
        let state = CraftState::new(20.0, 5.0);
        let config = SearchConfig::default().with_depth(1);
        let recommendation = search(&catalog, &state, &config).unwrap().unwrap();
        let best = recommendation.best;

        assert_eq!(best.technique, TechniqueId::from_str("simple_fusion"));
        assert_eq!(best.expected_completion, 15.0);
        assert_eq!(best.success_state.pool, 10.0);
        assert_eq!(best.success_state.stability, 3.0);
        assert_eq!(best.success_state.completion, 15.0);
        assert!(recommendation.alternatives.is_empty());
    }

    #[test]
    fn test_half_chance_scenario() {
        let catalog = Catalog::new().with_technique(gamble(0.5));
        let state = CraftState::new(20.0, 10.0);
        let best = search(&catalog, &state, &greedy()).unwrap().unwrap().best;

        assert_eq!(best.expected_completion, 10.0);
        assert_eq!(best.expected_stability, -2.0);
        assert_eq!(best.success_state.stability, 8.0);
        assert_eq!(best.failure_state.stability, 8.0);
    }

    #[test]
    fn test_greedy_matches_immediate_scores() {
        let catalog = Catalog::new()
            .with_technique(gamble(0.5))
            .with_technique(
                Technique::new("polish", TechniqueType::Refine)
                    .with_pool_cost(4.0)
                    .with_effect(Effect::perfection(Scaling::flat(12.0))),
            );
        let state = CraftState::new(20.0, 10.0);
        let rules = CraftRules::default();
        let drift = DriftPolicy::Static;
        let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
        let weights = ScoringWeights::default();

        let recommendation = recommend(&state, &ctx, &greedy()).unwrap().unwrap();
        let mut plans = vec![recommendation.best];
        plans.extend(recommendation.alternatives);
        for plan in plans {
            let immediate = plan.success_chance * weights.score(&plan.success_state, &ctx)
                + (1.0 - plan.success_chance) * weights.score(&plan.failure_state, &ctx);
            assert_eq!(plan.expected_score, immediate);
            assert_eq!(plan.sequence, vec![plan.technique.clone()]);
        }
    }

    #[test]
    fn test_success_chance_is_monotonic() {
        let state = CraftState::new(20.0, 10.0);
        let mut previous = [f64::MIN; 2];
        for chance in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let catalog = Catalog::new().with_technique(gamble(chance));
            for (slot, depth) in [0, 2].into_iter().enumerate() {
                let config = SearchConfig::default().with_depth(depth);
                let score = search(&catalog, &state, &config)
                    .unwrap()
                    .unwrap()
                    .best
                    .expected_score;
                assert!(score >= previous[slot]);
                previous[slot] = score;
            }
        }
    }

    #[test]
    fn test_failed_state_has_no_recommendation() {
        let catalog = Catalog::new().with_technique(gamble(1.0));
        let mut state = CraftState::new(20.0, 10.0);
        state.stability = 0.0;
        assert_eq!(search(&catalog, &state, &greedy()).unwrap(), None);
    }

    #[test]
    fn test_unaffordable_technique_excluded() {
        let catalog = Catalog::new()
            .with_technique(
                Technique::new("expensive", TechniqueType::Fusion)
                    .with_pool_cost(50.0)
                    .with_effect(Effect::completion(Scaling::flat(90.0))),
            )
            .with_technique(gamble(0.5));
        let state = CraftState::new(20.0, 10.0);
        let recommendation = search(&catalog, &state, &greedy()).unwrap().unwrap();
        assert_eq!(recommendation.best.technique, TechniqueId::from_str("gamble"));
        assert!(recommendation.alternatives.is_empty());
    }

    #[test]
    fn test_no_legal_action() {
        let catalog = Catalog::new().with_technique(
            Technique::new("expensive", TechniqueType::Fusion).with_pool_cost(50.0),
        );
        let state = CraftState::new(20.0, 10.0);
        assert_eq!(search(&catalog, &state, &greedy()).unwrap(), None);
    }

    #[test]
    fn test_ties_prefer_success_chance_then_declaration() {
        let sure = Technique::new("sure", TechniqueType::Fusion)
            .with_effect(Effect::completion(Scaling::flat(10.0)));
        let twin = Technique::new("twin", TechniqueType::Fusion)
            .with_effect(Effect::completion(Scaling::flat(10.0)));
        let catalog = Catalog::new()
            .with_technique(gamble(0.5).with_stability_cost(0.0))
            .with_technique(sure)
            .with_technique(twin);
        let state = CraftState::new(20.0, 10.0);
        let recommendation = search(&catalog, &state, &greedy()).unwrap().unwrap();

        let order: Vec<_> = std::iter::once(&recommendation.best)
            .chain(&recommendation.alternatives)
            .map(|plan| plan.technique.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["sure", "twin", "gamble"]);
    }

    #[test]
    fn test_alternatives_are_capped() {
        let mut catalog = Catalog::new();
        for (id, amount) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            catalog.add_technique(
                Technique::new(id, TechniqueType::Fusion)
                    .with_effect(Effect::completion(Scaling::flat(amount))),
            );
        }
        let state = CraftState::new(20.0, 10.0);
        let config = greedy().with_alternatives(2);
        let recommendation = search(&catalog, &state, &config).unwrap().unwrap();
        assert_eq!(recommendation.best.technique.as_str(), "d");
        let alternatives: Vec<_> = recommendation
            .alternatives
            .iter()
            .map(|plan| plan.technique.as_str())
            .collect();
        assert_eq!(alternatives, vec!["c", "b"]);
    }

    #[test]
    fn test_failure_risk_steers_away() {
        // stability 2: the risky move can collapse the craft
        let catalog = Catalog::new()
            .with_technique(
                Technique::new("reckless", TechniqueType::Fusion)
                    .with_success_chance(0.5)
                    .with_effect(Effect::completion(Scaling::flat(40.0)))
                    .with_effect(Effect::stability(Scaling::flat(-2.0))),
            )
            .with_technique(
                Technique::new("careful", TechniqueType::Fusion)
                    .with_effect(Effect::completion(Scaling::flat(5.0))),
            );
        let mut state = CraftState::new(20.0, 10.0);
        state.stability = 2.0;
        let best = search(&catalog, &state, &greedy()).unwrap().unwrap().best;
        assert_eq!(best.technique.as_str(), "careful");
    }

    #[test]
    fn test_lookahead_sequence() {
        let catalog = Catalog::new().with_technique(
            Technique::new("press", TechniqueType::Fusion)
                .with_pool_cost(5.0)
                .with_effect(Effect::completion(Scaling::flat(10.0))),
        );
        let state = CraftState::new(20.0, 10.0);
        let config = SearchConfig::default().with_depth(2);
        let recommendation = search(&catalog, &state, &config).unwrap().unwrap();
        assert_eq!(recommendation.best.sequence.len(), 3);
        assert_eq!(recommendation.best.expected_score, 30.0);
        assert!(recommendation.nodes_visited >= 3);
    }

    #[test]
    fn test_invalid_inputs_abort() {
        let catalog = Catalog::new().with_technique(gamble(0.5));
        let state = CraftState::new(20.0, 10.0);
        let config = SearchConfig::default().with_depth(MAX_DEPTH + 1);
        assert!(matches!(
            search(&catalog, &state, &config),
            Err(CraftError::InvalidConfig(_))
        ));

        let mut broken = state.clone();
        broken.pool = -5.0;
        assert!(matches!(
            search(&catalog, &broken, &greedy()),
            Err(CraftError::InvalidState(_))
        ));
    }

    #[test]
    fn test_invalid_rules_abort() {
        let catalog = Catalog::new().with_technique(gamble(0.5));
        let state = CraftState::new(20.0, 10.0);
        let drift = DriftPolicy::Static;
        for rules in [
            CraftRules::new(0.0, 50.0),
            CraftRules::default().with_condition(
                Condition::Neutral,
                ConditionModifiers {
                    pool_cost: f64::NAN,
                    stability_cost: 1.0,
                },
            ),
        ] {
            let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
            assert!(matches!(
                recommend(&state, &ctx, &greedy()),
                Err(CraftError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_unsupported_effect_aborts() {
        let catalog = Catalog::new()
            .with_technique(gamble(0.5))
            .with_technique(
                Technique::new("mystery", TechniqueType::Support)
                    .with_effect(Effect::Unsupported("transmute".to_string())),
            );
        let state = CraftState::new(20.0, 10.0);
        assert_eq!(
            search(&catalog, &state, &greedy()),
            Err(CraftError::UnsupportedEffect("transmute".to_string()))
        );
    }
}
