//! Technique and buff definitions.
//!
//! The catalog is supplied by the host once per session and is read-only
//! for the engine. Techniques keep their declaration order because the
//! search uses it as its final tie-breaker.

use crate::effect::Effect;
use crate::error::{CraftError, Result};
use crate::ids::{BuffId, StatId, TechniqueId};
use crate::scaling::Scaling;
use crate::state::Condition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Technique family. Decides which buff triggers fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TechniqueType {
    Fusion,
    Refine,
    Stabilize,
    Support,
}

impl TechniqueType {
    /// The buff trigger matching this technique type.
    pub fn trigger(self) -> BuffTrigger {
        match self {
            TechniqueType::Fusion => BuffTrigger::OnFusion,
            TechniqueType::Refine => BuffTrigger::OnRefine,
            TechniqueType::Stabilize => BuffTrigger::OnStabilize,
            TechniqueType::Support => BuffTrigger::OnSupport,
        }
    }
}

/// When a buff's effects fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuffTrigger {
    /// On every technique use.
    Always,
    OnFusion,
    OnRefine,
    OnStabilize,
    OnSupport,
}

/// How a buff loses stacks on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuffDecay {
    /// Stacks only change through effects.
    #[default]
    Persistent,
    /// Loses this many stacks at the end of every turn.
    PerTurn(u32),
    /// Loses one stack each turn its trigger effects fire.
    OnTrigger,
}

/// A buff requirement or a buff-stack cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffCost {
    pub buff: BuffId,
    pub stacks: u32,
}

/// One mastery-tier adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TierAdjust {
    /// Replace the value.
    Set(f64),
    /// Add to the value.
    Add(f64),
    /// Multiply the value.
    Multiply(f64),
}

impl TierAdjust {
    /// Apply the adjustment to a value.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            TierAdjust::Set(v) => v,
            TierAdjust::Add(v) => value + v,
            TierAdjust::Multiply(v) => value * v,
        }
    }
}

/// Overrides unlocked at one mastery tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryTier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_cost: Option<TierAdjust>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_cost: Option<TierAdjust>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_chance: Option<TierAdjust>,
    /// Multiplier on the technique's own effect amounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_multiplier: Option<f64>,
}

fn certain() -> f64 {
    1.0
}

/// A technique definition.
///
/// # Examples
///
/// ```rust
/// use craftsage::{Effect, Scaling, Technique, TechniqueType};
///
/// let fusion = Technique::new("simple_fusion", TechniqueType::Fusion)
///     .with_pool_cost(10.0)
///     .with_stability_cost(2.0)
///     .with_effect(Effect::completion(Scaling::flat(15.0)));
///
/// assert_eq!(fusion.pool_cost, 10.0);
/// assert_eq!(fusion.success_chance, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technique {
    pub id: TechniqueId,
    #[serde(rename = "type")]
    pub kind: TechniqueType,
    #[serde(default)]
    pub pool_cost: f64,
    #[serde(default)]
    pub stability_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toxicity_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buff_cost: Option<BuffCost>,
    #[serde(default = "certain")]
    pub success_chance: f64,
    #[serde(default)]
    pub cooldown: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_requirement: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buff_requirement: Option<BuffCost>,
    /// Suppresses the per-use max stability loss.
    #[serde(default)]
    pub no_max_stability_loss: bool,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Number of mastery tiers the crafter has unlocked.
    #[serde(default)]
    pub mastery_tier: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mastery: Vec<MasteryTier>,
}

impl Technique {
    /// A free, always-successful technique with no effects.
    pub fn new(id: impl Into<TechniqueId>, kind: TechniqueType) -> Self {
        Self {
            id: id.into(),
            kind,
            pool_cost: 0.0,
            stability_cost: 0.0,
            toxicity_cost: None,
            buff_cost: None,
            success_chance: 1.0,
            cooldown: 0,
            condition_requirement: None,
            buff_requirement: None,
            no_max_stability_loss: false,
            effects: Vec::new(),
            mastery_tier: 0,
            mastery: Vec::new(),
        }
    }

    pub fn with_pool_cost(mut self, cost: f64) -> Self {
        self.pool_cost = cost;
        self
    }

    pub fn with_stability_cost(mut self, cost: f64) -> Self {
        self.stability_cost = cost;
        self
    }

    pub fn with_toxicity_cost(mut self, cost: f64) -> Self {
        self.toxicity_cost = Some(cost);
        self
    }

    pub fn with_buff_cost(mut self, buff: impl Into<BuffId>, stacks: u32) -> Self {
        self.buff_cost = Some(BuffCost {
            buff: buff.into(),
            stacks,
        });
        self
    }

    pub fn with_success_chance(mut self, chance: f64) -> Self {
        self.success_chance = chance;
        self
    }

    pub fn with_cooldown(mut self, turns: u32) -> Self {
        self.cooldown = turns;
        self
    }

    pub fn requiring_condition(mut self, condition: Condition) -> Self {
        self.condition_requirement = Some(condition);
        self
    }

    pub fn requiring_buff(mut self, buff: impl Into<BuffId>, stacks: u32) -> Self {
        self.buff_requirement = Some(BuffCost {
            buff: buff.into(),
            stacks,
        });
        self
    }

    pub fn without_max_stability_loss(mut self) -> Self {
        self.no_max_stability_loss = true;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Add a mastery tier and unlock it.
    pub fn with_mastery(mut self, tier: MasteryTier) -> Self {
        self.mastery.push(tier);
        self.mastery_tier = self.mastery.len();
        self
    }

    /// Tiers that are unlocked, in the order they apply.
    pub fn unlocked_tiers(&self) -> &[MasteryTier] {
        &self.mastery[..self.mastery_tier.min(self.mastery.len())]
    }

    /// Combined multiplier on the technique's own effect amounts.
    pub fn effect_multiplier(&self) -> f64 {
        self.unlocked_tiers()
            .iter()
            .filter_map(|tier| tier.effect_multiplier)
            .product()
    }
}

/// How a buff modifier combines with the stat it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierOp {
    /// Flat addition.
    Add,
    /// Percentage of the stat after all flat additions.
    Percent,
}

/// A continuous stat modifier carried by a buff, scaled by its stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: StatId,
    pub op: ModifierOp,
    pub amount: Scaling,
}

impl StatModifier {
    pub fn add(stat: impl Into<StatId>, amount: Scaling) -> Self {
        Self {
            stat: stat.into(),
            op: ModifierOp::Add,
            amount,
        }
    }

    pub fn percent(stat: impl Into<StatId>, amount: Scaling) -> Self {
        Self {
            stat: stat.into(),
            op: ModifierOp::Percent,
            amount,
        }
    }
}

fn default_max_stacks() -> u32 {
    1
}

/// A buff definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buff {
    pub id: BuffId,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stats: Vec<StatModifier>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effects: BTreeMap<BuffTrigger, Vec<Effect>>,
    #[serde(default)]
    pub decay: BuffDecay,
}

impl Buff {
    /// A non-stackable, persistent buff with no modifiers.
    pub fn new(id: impl Into<BuffId>) -> Self {
        Self {
            id: id.into(),
            stackable: false,
            max_stacks: 1,
            stats: Vec::new(),
            effects: BTreeMap::new(),
            decay: BuffDecay::Persistent,
        }
    }

    pub fn stackable(mut self, max_stacks: u32) -> Self {
        self.stackable = true;
        self.max_stacks = max_stacks;
        self
    }

    pub fn with_stat(mut self, modifier: StatModifier) -> Self {
        self.stats.push(modifier);
        self
    }

    pub fn on(mut self, trigger: BuffTrigger, effect: Effect) -> Self {
        self.effects.entry(trigger).or_default().push(effect);
        self
    }

    pub fn with_decay(mut self, decay: BuffDecay) -> Self {
        self.decay = decay;
        self
    }

    /// Effective stack cap: `1` for non-stackable buffs.
    pub fn max_stacks(&self) -> u32 {
        if self.stackable {
            self.max_stacks.max(1)
        } else {
            1
        }
    }

    /// Effects that fire for a technique type: `Always` first, then the
    /// type-specific list.
    pub fn triggered_effects(&self, kind: TechniqueType) -> impl Iterator<Item = &Effect> {
        let always = self.effects.get(&BuffTrigger::Always).into_iter().flatten();
        let typed = self.effects.get(&kind.trigger()).into_iter().flatten();
        always.chain(typed)
    }
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    techniques: Vec<Technique>,
    #[serde(default)]
    buffs: Vec<Buff>,
}

/// Read-only technique and buff definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    techniques: Vec<Technique>,
    buffs: BTreeMap<BuffId, Buff>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from the host's JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawCatalog =
            serde_json::from_str(json).map_err(|e| CraftError::Catalog(e.to_string()))?;
        let mut catalog = Catalog::new();
        for buff in raw.buffs {
            catalog.add_buff(buff);
        }
        for technique in raw.techniques {
            catalog.add_technique(technique);
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Add a technique. Re-adding an id replaces the definition in place.
    pub fn add_technique(&mut self, technique: Technique) {
        match self.techniques.iter_mut().find(|t| t.id == technique.id) {
            Some(existing) => *existing = technique,
            None => self.techniques.push(technique),
        }
    }

    /// Add or replace a buff.
    pub fn add_buff(&mut self, buff: Buff) {
        self.buffs.insert(buff.id.clone(), buff);
    }

    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.add_technique(technique);
        self
    }

    pub fn with_buff(mut self, buff: Buff) -> Self {
        self.add_buff(buff);
        self
    }

    /// Techniques in declaration order.
    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    pub fn buffs(&self) -> impl Iterator<Item = &Buff> {
        self.buffs.values()
    }

    pub fn technique(&self, id: &TechniqueId) -> Result<&Technique> {
        self.techniques
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| CraftError::UnknownTechnique(id.clone()))
    }

    pub fn buff(&self, id: &BuffId) -> Result<&Buff> {
        self.buffs
            .get(id)
            .ok_or_else(|| CraftError::UnknownBuff(id.clone()))
    }

    /// Declaration index of a technique.
    pub fn position(&self, id: &TechniqueId) -> Option<usize> {
        self.techniques.iter().position(|t| &t.id == id)
    }

    /// Check cross references and modifier dependencies.
    ///
    /// Every buff named by a technique or effect must exist, success
    /// chances must lie in `[0, 1]`, and buff stat modifiers must not
    /// depend on each other in a cycle.
    pub fn validate(&self) -> Result<()> {
        for technique in &self.techniques {
            if !(0.0..=1.0).contains(&technique.success_chance) {
                return Err(CraftError::Catalog(format!(
                    "technique {} has success chance {}",
                    technique.id, technique.success_chance
                )));
            }
            for cost in [&technique.buff_cost, &technique.buff_requirement]
                .into_iter()
                .flatten()
            {
                self.buff(&cost.buff)?;
            }
            for effect in &technique.effects {
                self.check_effect(effect)?;
            }
        }
        for buff in self.buffs.values() {
            for effect in buff.effects.values().flatten() {
                self.check_effect(effect)?;
            }
        }
        crate::stats::modifier_graph(self).topological_sort()?;
        Ok(())
    }

    fn check_effect(&self, effect: &Effect) -> Result<()> {
        if let Some(buff) = effect.target_buff() {
            self.buff(buff)?;
        }
        if let Some(buff) = effect.condition().and_then(|c| c.referenced_buff()) {
            self.buff(buff)?;
        }
        Ok(())
    }
}
