//! Optional `petgraph`-backed cycle detection, for callers who already
//! depend on `petgraph` elsewhere and would rather share one
//! cycle-detection implementation than carry two.

use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;

use crate::graph::NodeDef;
use crate::graphs::validate::GraphError;
use crate::types::NodeName;

pub fn detect_cycle(
    nodes: &FxHashMap<NodeName, NodeDef>,
    order: &[NodeName],
) -> Result<(), GraphError> {
    let mut graph = DiGraph::<NodeName, ()>::new();
    let mut indices = FxHashMap::default();
    for name in order {
        indices.insert(name.clone(), graph.add_node(name.clone()));
    }
    for name in order {
        for dep in nodes[name].dependencies() {
            if let (Some(&from), Some(&to)) = (indices.get(name), indices.get(&dep)) {
                graph.add_edge(from, to, ());
            }
        }
    }

    if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
        let node = graph[cycle.node_id()].clone();
        return Err(GraphError::Cycle { node });
    }
    Ok(())
}
