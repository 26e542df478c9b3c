//! Modifier dependency graph.
//!
//! Buff stat modifiers can scale with other stats ("+10% of control to
//! intensity"). `ModifierGraph` records those dependencies as a DAG so the
//! stat sheet can resolve stats in an order where every dependency is
//! final before it is read.

use crate::error::CraftError;
use crate::ids::StatId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of stat dependencies.
///
/// If stat A's modifiers read stat B, then B must be resolved before A.
///
/// # Examples
///
/// ```rust
/// use craftsage::graph::ModifierGraph;
/// use craftsage::StatId;
///
/// let mut graph = ModifierGraph::new();
/// let control = StatId::from_str("control");
/// let intensity = StatId::from_str("intensity");
///
/// // intensity scales with control
/// graph.add_edge(intensity.clone(), control.clone());
///
/// let order = graph.topological_sort().unwrap();
/// let c = order.iter().position(|s| s == &control).unwrap();
/// let i = order.iter().position(|s| s == &intensity).unwrap();
/// assert!(c < i);
/// ```
#[derive(Debug, Default)]
pub struct ModifierGraph {
    graph: DiGraph<StatId, ()>,
    node_map: HashMap<StatId, NodeIndex>,
}

impl ModifierGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't exist and return its index.
    pub fn add_node(&mut self, stat_id: StatId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat_id) {
            idx
        } else {
            let idx = self.graph.add_node(stat_id.clone());
            self.node_map.insert(stat_id, idx);
            idx
        }
    }

    /// Record that `from` depends on `to`.
    ///
    /// Both nodes are added if missing.
    pub fn add_edge(&mut self, from: StatId, to: StatId) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        self.graph.update_edge(to_idx, from_idx, ());
    }

    /// Check whether a node exists.
    pub fn contains_node(&self, stat_id: &StatId) -> bool {
        self.node_map.contains_key(stat_id)
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Detect cycles.
    ///
    /// Returns `ModifierCycle` with the closed path (`[a, b, a]`) of the
    /// first cycle found.
    pub fn detect_cycles(&self) -> Result<(), CraftError> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut on_stack, &mut path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<StatId>,
    ) -> Option<CraftError> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(self.graph[node].clone());

        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(&neighbor) {
                let neighbor_stat = self.graph[neighbor].clone();
                let start = path
                    .iter()
                    .position(|stat| stat == &neighbor_stat)
                    .unwrap_or(0);
                let mut cycle: Vec<StatId> = path[start..].to_vec();
                cycle.push(neighbor_stat);
                return Some(CraftError::ModifierCycle { path: cycle });
            }
        }

        on_stack.remove(&node);
        path.pop();
        None
    }

    /// Resolution order, dependencies first.
    pub fn topological_sort(&self) -> Result<Vec<StatId>, CraftError> {
        self.detect_cycles()?;

        toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect()
            })
            .map_err(|cycle| CraftError::ModifierCycle {
                path: vec![self.graph[cycle.node_id()].clone()],
            })
    }
}
