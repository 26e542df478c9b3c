//! Stat sheet resolution.
//!
//! Builds the variable bag a state's formulas are evaluated against:
//!
//! ```text
//! [state fields + buff stacks + base stats] → [buff stat modifiers] → VariableBag
//! ```
//!
//! Modifiers are applied per stat in dependency order, so a modifier that
//! reads another stat always sees that stat's final value. Within one stat
//! all flat additions are summed before percentages apply:
//! `(base + Σadd) × (1 + Σpercent / 100)`.

use crate::catalog::{Catalog, ModifierOp, StatModifier};
use crate::error::Result;
use crate::graph::ModifierGraph;
use crate::ids::StatId;
use crate::scaling::{evaluate, Scaling};
use crate::state::CraftState;
use crate::variables::{names, VariableBag};
use std::collections::BTreeMap;

/// How one stat's final value was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct StatBreakdown {
    pub base: f64,
    /// Sum of flat modifiers.
    pub flat: f64,
    /// Sum of percentage modifiers.
    pub percent: f64,
    pub value: f64,
}

/// Resolved variables for one state.
///
/// # Examples
///
/// ```rust
/// use craftsage::{Buff, Catalog, CraftState, Scaling, StatModifier, StatSheet};
///
/// let catalog = Catalog::new().with_buff(
///     Buff::new("focus")
///         .stackable(5)
///         .with_stat(StatModifier::add("control", Scaling::flat(4.0))),
/// );
/// let state = CraftState::new(30.0, 10.0)
///     .with_stat("control", 20.0)
///     .with_buff("focus", 2);
///
/// let sheet = StatSheet::resolve(&state, &catalog).unwrap();
/// assert_eq!(sheet.get("control"), 28.0);
/// assert_eq!(sheet.get("focus"), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct StatSheet {
    variables: VariableBag,
    breakdown: BTreeMap<StatId, StatBreakdown>,
}

impl StatSheet {
    /// Resolve every variable visible to formulas in `state`.
    pub fn resolve(state: &CraftState, catalog: &Catalog) -> Result<Self> {
        let mut variables = base_variables(state);

        let mut modifiers: BTreeMap<StatId, Vec<(&StatModifier, f64)>> = BTreeMap::new();
        let mut graph = ModifierGraph::new();
        for entry in state.active_buffs.iter() {
            let buff = catalog.buff(&entry.buff)?;
            for modifier in &buff.stats {
                add_dependencies(&mut graph, modifier);
                modifiers
                    .entry(modifier.stat.clone())
                    .or_default()
                    .push((modifier, f64::from(entry.stacks)));
            }
        }

        let mut breakdown = BTreeMap::new();
        for stat in graph.topological_sort()? {
            let Some(list) = modifiers.get(&stat) else {
                continue;
            };
            let base = variables.get_id(&stat);
            let mut flat = 0.0;
            let mut percent = 0.0;
            for (modifier, stacks) in list {
                let amount = evaluate(&modifier.amount, &variables) * stacks;
                match modifier.op {
                    ModifierOp::Add => flat += amount,
                    ModifierOp::Percent => percent += amount,
                }
            }
            let value = (base + flat) * (1.0 + percent / 100.0);
            variables.set(stat.clone(), value);
            breakdown.insert(
                stat,
                StatBreakdown {
                    base,
                    flat,
                    percent,
                    value,
                },
            );
        }

        Ok(Self {
            variables,
            breakdown,
        })
    }

    /// Final value of a variable, `0.0` when unknown.
    pub fn get(&self, stat: &str) -> f64 {
        self.variables.get(stat)
    }

    /// The full variable bag.
    pub fn variables(&self) -> &VariableBag {
        &self.variables
    }

    /// How a modified stat was computed. `None` for stats no active buff
    /// touches.
    pub fn breakdown(&self, stat: &str) -> Option<&StatBreakdown> {
        self.breakdown.get(&StatId::from_str(stat))
    }
}

/// Variables that come straight from the state.
fn base_variables(state: &CraftState) -> VariableBag {
    let mut variables: VariableBag = state
        .stats
        .iter()
        .map(|(stat, value)| (stat.clone(), *value))
        .collect();
    variables.set(names::POOL, state.pool);
    variables.set(names::MAX_POOL, state.max_pool);
    variables.set(names::STABILITY, state.stability);
    variables.set(names::MAX_STABILITY, state.max_stability);
    variables.set(names::TOXICITY, state.toxicity);
    variables.set(names::COMPLETION, state.completion);
    variables.set(names::PERFECTION, state.perfection);
    variables.set(names::TURN, f64::from(state.turn));
    for entry in state.active_buffs.iter() {
        variables.set(StatId::from(&entry.buff), f64::from(entry.stacks));
    }
    variables
}

fn add_dependencies(graph: &mut ModifierGraph, modifier: &StatModifier) {
    graph.add_node(modifier.stat.clone());
    let mut refs = Vec::new();
    collect_references(&modifier.amount, &mut refs);
    for dep in refs {
        graph.add_edge(modifier.stat.clone(), dep);
    }
}

fn collect_references(scaling: &Scaling, out: &mut Vec<StatId>) {
    for term in [&scaling.stat_reference, &scaling.named_variable]
        .into_iter()
        .flatten()
    {
        out.push(term.id.clone());
    }
    if let Some(cap) = &scaling.cap {
        collect_references(cap, out);
    }
}

/// Dependency graph of every buff modifier in the catalog.
///
/// Used to reject catalogs whose modifiers could ever form a cycle.
pub fn modifier_graph(catalog: &Catalog) -> ModifierGraph {
    let mut graph = ModifierGraph::new();
    for buff in catalog.buffs() {
        for modifier in &buff.stats {
            add_dependencies(&mut graph, modifier);
        }
    }
    graph
}
