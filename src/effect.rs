//! Effect resolver.
//!
//! An `Effect` is one atomic change to a craft: gain completion, lose
//! stability, create a buff, and so on. Effects are a closed enum matched
//! exhaustively; a host effect kind the engine does not model deserializes
//! into `Effect::Unsupported` and fails the batch that contains it.
//!
//! All amounts are evaluated against the variable bag of the state the
//! batch started from, and every `when` condition is checked against that
//! same state before anything is applied.

use crate::catalog::Catalog;
use crate::error::{CraftError, Result};
use crate::ids::{BuffId, StatId};
use crate::native::ParityStrategy;
use crate::scaling::Scaling;
use crate::state::{Condition, CraftState};
use crate::variables::{names, VariableBag};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Guard that must hold for an effect to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectCondition {
    /// The craft is in this condition.
    ConditionIs(Condition),
    /// The buff has at least this many stacks.
    BuffAtLeast { buff: BuffId, stacks: u32 },
    /// A variable is at least this value.
    StatAtLeast { stat: StatId, value: f64 },
}

impl EffectCondition {
    /// Whether the condition holds.
    pub fn holds(&self, state: &CraftState, variables: &VariableBag) -> bool {
        match self {
            EffectCondition::ConditionIs(condition) => state.condition == *condition,
            EffectCondition::BuffAtLeast { buff, stacks } => {
                state.active_buffs.stacks(buff) >= *stacks
            }
            EffectCondition::StatAtLeast { stat, value } => variables.get_id(stat) >= *value,
        }
    }

    /// The buff this condition inspects, if any.
    pub fn referenced_buff(&self) -> Option<&BuffId> {
        match self {
            EffectCondition::BuffAtLeast { buff, .. } => Some(buff),
            _ => None,
        }
    }
}

/// Effect kinds, as tagged by the host.
const KNOWN_KINDS: [&str; 11] = [
    "completion",
    "perfection",
    "stability",
    "maxStability",
    "pool",
    "createBuff",
    "consumeBuff",
    "addStack",
    "cleanseToxicity",
    "negate",
    "changeToxicity",
];

/// One atomic effect.
///
/// # Examples
///
/// ```rust
/// use craftsage::{Effect, Scaling};
///
/// let effect: Effect = serde_json::from_str(
///     r#"{"kind": "completion", "amount": {"baseValue": 15}}"#,
/// ).unwrap();
/// assert_eq!(effect, Effect::completion(Scaling::flat(15.0)));
///
/// let unknown: Effect = serde_json::from_str(r#"{"kind": "transmute"}"#).unwrap();
/// assert_eq!(unknown, Effect::Unsupported("transmute".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "kind", rename_all = "camelCase")]
pub enum Effect {
    Completion {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    Perfection {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    Stability {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    MaxStability {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    Pool {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    /// Add stacks of a buff, activating it if absent.
    CreateBuff {
        buff: BuffId,
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    /// Remove stacks of a buff.
    ConsumeBuff {
        buff: BuffId,
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    /// Add stacks to a buff that is already active. Without a `buff`, the
    /// buff that owns the effect is targeted.
    AddStack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buff: Option<BuffId>,
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    CleanseToxicity {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    /// Suppress every later effect in the same batch.
    Negate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    ChangeToxicity {
        amount: Scaling,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<EffectCondition>,
    },
    /// A host effect kind with no local model.
    #[serde(skip)]
    Unsupported(String),
}

impl Serialize for Effect {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Effect::Unsupported(kind) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("kind", kind)?;
                map.end()
            }
            _ => Effect::serialize(self, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Effect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value.get("kind").and_then(|kind| kind.as_str()) {
            Some(kind) if !KNOWN_KINDS.contains(&kind) => Ok(Effect::Unsupported(kind.to_owned())),
            _ => Effect::deserialize(value).map_err(serde::de::Error::custom),
        }
    }
}

impl Effect {
    pub fn completion(amount: Scaling) -> Self {
        Effect::Completion { amount, when: None }
    }

    pub fn perfection(amount: Scaling) -> Self {
        Effect::Perfection { amount, when: None }
    }

    pub fn stability(amount: Scaling) -> Self {
        Effect::Stability { amount, when: None }
    }

    pub fn max_stability(amount: Scaling) -> Self {
        Effect::MaxStability { amount, when: None }
    }

    pub fn pool(amount: Scaling) -> Self {
        Effect::Pool { amount, when: None }
    }

    pub fn create_buff(buff: impl Into<BuffId>, stacks: f64) -> Self {
        Effect::CreateBuff {
            buff: buff.into(),
            amount: Scaling::flat(stacks),
            when: None,
        }
    }

    pub fn consume_buff(buff: impl Into<BuffId>, stacks: f64) -> Self {
        Effect::ConsumeBuff {
            buff: buff.into(),
            amount: Scaling::flat(stacks),
            when: None,
        }
    }

    /// Add stacks to the owning buff.
    pub fn add_stack(stacks: f64) -> Self {
        Effect::AddStack {
            buff: None,
            amount: Scaling::flat(stacks),
            when: None,
        }
    }

    pub fn cleanse_toxicity(amount: Scaling) -> Self {
        Effect::CleanseToxicity { amount, when: None }
    }

    pub fn change_toxicity(amount: Scaling) -> Self {
        Effect::ChangeToxicity { amount, when: None }
    }

    pub fn negate() -> Self {
        Effect::Negate { when: None }
    }

    /// Attach a condition. No-op on `Unsupported`.
    pub fn when(mut self, condition: EffectCondition) -> Self {
        match &mut self {
            Effect::Completion { when, .. }
            | Effect::Perfection { when, .. }
            | Effect::Stability { when, .. }
            | Effect::MaxStability { when, .. }
            | Effect::Pool { when, .. }
            | Effect::CreateBuff { when, .. }
            | Effect::ConsumeBuff { when, .. }
            | Effect::AddStack { when, .. }
            | Effect::CleanseToxicity { when, .. }
            | Effect::Negate { when }
            | Effect::ChangeToxicity { when, .. } => *when = Some(condition),
            Effect::Unsupported(_) => {}
        }
        self
    }

    /// The effect's guard, if any.
    pub fn condition(&self) -> Option<&EffectCondition> {
        match self {
            Effect::Completion { when, .. }
            | Effect::Perfection { when, .. }
            | Effect::Stability { when, .. }
            | Effect::MaxStability { when, .. }
            | Effect::Pool { when, .. }
            | Effect::CreateBuff { when, .. }
            | Effect::ConsumeBuff { when, .. }
            | Effect::AddStack { when, .. }
            | Effect::CleanseToxicity { when, .. }
            | Effect::Negate { when }
            | Effect::ChangeToxicity { when, .. } => when.as_ref(),
            Effect::Unsupported(_) => None,
        }
    }

    /// The buff an effect creates, consumes or stacks.
    pub fn target_buff(&self) -> Option<&BuffId> {
        match self {
            Effect::CreateBuff { buff, .. } | Effect::ConsumeBuff { buff, .. } => Some(buff),
            Effect::AddStack { buff, .. } => buff.as_ref(),
            _ => None,
        }
    }

    /// Completion and perfection gains are withheld when a technique fails.
    pub fn is_progress(&self) -> bool {
        matches!(self, Effect::Completion { .. } | Effect::Perfection { .. })
    }

    fn applies(&self, state: &CraftState, variables: &VariableBag) -> bool {
        self.condition()
            .map(|condition| condition.holds(state, variables))
            .unwrap_or(true)
    }
}

/// Upper bounds for completion and perfection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Caps {
    pub completion: f64,
    pub perfection: f64,
}

/// Everything an effect needs besides the state.
pub struct EffectContext<'a> {
    pub catalog: &'a Catalog,
    pub model: &'a dyn ParityStrategy,
    /// Variables of the state the batch started from.
    pub variables: &'a VariableBag,
    pub caps: Caps,
    /// Withhold completion and perfection gains (failed technique).
    pub suppress_progress: bool,
}

/// An effect queued in a batch, with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredEffect {
    pub effect: Effect,
    /// Buff whose trigger produced the effect; `None` for the technique's
    /// own effects.
    pub owner: Option<BuffId>,
    /// Multiplier on the evaluated amount (mastery).
    pub multiplier: f64,
}

impl TriggeredEffect {
    pub fn own(effect: Effect, multiplier: f64) -> Self {
        Self {
            effect,
            owner: None,
            multiplier,
        }
    }

    pub fn from_buff(effect: Effect, owner: BuffId) -> Self {
        Self {
            effect,
            owner: Some(owner),
            multiplier: 1.0,
        }
    }
}

/// Apply a single effect and return the new state.
pub fn apply(effect: &Effect, state: &CraftState, ctx: &EffectContext<'_>) -> Result<CraftState> {
    let mut next = state.clone();
    if effect.applies(state, ctx.variables) {
        apply_in_place(effect, None, 1.0, &mut next, ctx)?;
    }
    Ok(next)
}

/// The result of applying a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedBatch {
    /// State after every applied effect.
    pub state: CraftState,
    /// Buffs that owned at least one effect that actually applied.
    pub fired: BTreeSet<BuffId>,
}

/// Apply a batch in order.
///
/// An unsupported effect anywhere in the batch fails it, even behind a
/// `Negate`. A pre-pass then finds the first `Negate` whose condition holds;
/// every effect after it is dropped. Effects before it still apply.
pub fn apply_batch(
    batch: &[TriggeredEffect],
    state: &CraftState,
    ctx: &EffectContext<'_>,
) -> Result<AppliedBatch> {
    if let Some(kind) = batch.iter().find_map(|queued| match &queued.effect {
        Effect::Unsupported(kind) => Some(kind),
        _ => None,
    }) {
        return Err(CraftError::UnsupportedEffect(kind.clone()));
    }

    let cutoff = batch
        .iter()
        .position(|queued| {
            matches!(queued.effect, Effect::Negate { .. })
                && queued.effect.applies(state, ctx.variables)
        })
        .unwrap_or(batch.len());

    let mut next = state.clone();
    let mut fired = BTreeSet::new();
    for queued in &batch[..cutoff] {
        if !queued.effect.applies(state, ctx.variables) {
            continue;
        }
        apply_in_place(
            &queued.effect,
            queued.owner.as_ref(),
            queued.multiplier,
            &mut next,
            ctx,
        )?;
        if let Some(owner) = &queued.owner {
            fired.insert(owner.clone());
        }
    }
    Ok(AppliedBatch { state: next, fired })
}

fn amount(
    scaling: &Scaling,
    owner: Option<&BuffId>,
    multiplier: f64,
    ctx: &EffectContext<'_>,
) -> f64 {
    let value = match owner {
        Some(buff) => {
            let stacks = ctx.variables.get_id(&StatId::from(buff));
            let variables = ctx.variables.with(names::STACKS, stacks);
            ctx.model.evaluate(scaling, &variables)
        }
        None => ctx.model.evaluate(scaling, ctx.variables),
    };
    value * multiplier
}

fn stack_count(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn gain(current: f64, delta: f64, cap: f64) -> (f64, f64) {
    let raw = (current + delta).max(0.0);
    let kept = raw.min(cap.max(current));
    (kept, raw - kept)
}

fn apply_in_place(
    effect: &Effect,
    owner: Option<&BuffId>,
    multiplier: f64,
    state: &mut CraftState,
    ctx: &EffectContext<'_>,
) -> Result<()> {
    match effect {
        Effect::Completion { amount: scaling, .. } => {
            if ctx.suppress_progress {
                return Ok(());
            }
            let delta = amount(scaling, owner, multiplier, ctx);
            let (kept, wasted) = gain(state.completion, delta, ctx.caps.completion);
            state.completion = kept;
            state.wasted_completion += wasted;
        }
        Effect::Perfection { amount: scaling, .. } => {
            if ctx.suppress_progress {
                return Ok(());
            }
            let delta = amount(scaling, owner, multiplier, ctx);
            let (kept, wasted) = gain(state.perfection, delta, ctx.caps.perfection);
            state.perfection = kept;
            state.wasted_perfection += wasted;
        }
        Effect::Stability { amount: scaling, .. } => {
            let delta = amount(scaling, owner, multiplier, ctx);
            state.stability = (state.stability + delta).clamp(0.0, state.max_stability);
        }
        Effect::MaxStability { amount: scaling, .. } => {
            let delta = amount(scaling, owner, multiplier, ctx);
            state.max_stability = (state.max_stability + delta).max(0.0);
            state.stability = state.stability.min(state.max_stability);
        }
        Effect::Pool { amount: scaling, .. } => {
            let delta = amount(scaling, owner, multiplier, ctx);
            state.pool = (state.pool + delta).clamp(0.0, state.max_pool);
        }
        Effect::CreateBuff {
            buff,
            amount: scaling,
            ..
        } => {
            let definition = ctx.catalog.buff(buff)?;
            let mut stacks = stack_count(amount(scaling, owner, multiplier, ctx));
            if !definition.stackable {
                stacks = stacks.min(1);
            }
            state
                .active_buffs
                .add(buff, stacks, definition.max_stacks());
        }
        Effect::ConsumeBuff {
            buff,
            amount: scaling,
            ..
        } => {
            let stacks = stack_count(amount(scaling, owner, multiplier, ctx));
            state.active_buffs.remove(buff, stacks);
        }
        Effect::AddStack {
            buff,
            amount: scaling,
            ..
        } => {
            let target = buff.as_ref().or(owner).ok_or_else(|| {
                CraftError::InvalidState("addStack effect has no target buff".to_string())
            })?;
            if state.active_buffs.contains(target) {
                let definition = ctx.catalog.buff(target)?;
                let stacks = stack_count(amount(scaling, owner, multiplier, ctx));
                state
                    .active_buffs
                    .add(target, stacks, definition.max_stacks());
            }
        }
        Effect::CleanseToxicity { amount: scaling, .. } => {
            let delta = amount(scaling, owner, multiplier, ctx);
            state.toxicity = (state.toxicity - delta).max(0.0);
        }
        Effect::ChangeToxicity { amount: scaling, .. } => {
            let delta = amount(scaling, owner, multiplier, ctx);
            state.toxicity = (state.toxicity + delta).max(0.0);
        }
        Effect::Negate { .. } => {}
        Effect::Unsupported(kind) => return Err(CraftError::UnsupportedEffect(kind.clone())),
    }
    Ok(())
}
