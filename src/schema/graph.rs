//! Dependency graph between derived columns.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::Schema;

/// Edges point from a derived column to the derived columns its
/// expression references.
pub(crate) struct DerivedGraph<'a> {
    graph: DiGraph<&'a str, ()>,
}

impl<'a> DerivedGraph<'a> {
    pub fn build(schema: &'a Schema) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for name in schema.derived.keys() {
            nodes.insert(name.as_str(), graph.add_node(name.as_str()));
        }

        for (name, derived) in &schema.derived {
            let from = nodes[name.as_str()];
            for column in derived.expr.columns() {
                if let Some(&to) = nodes.get(column) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        Self { graph }
    }

    /// Each returned group is one cycle, in declaration order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                if scc.len() == 1 {
                    self.graph.edges_connecting(scc[0], scc[0]).next().is_some()
                } else {
                    true
                }
            })
            .map(|mut scc| {
                scc.sort();
                scc.into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).map(|n| n.to_string()))
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }
}
