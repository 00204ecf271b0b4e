//! Read-only views over the store (SPEC_FULL.md §4.9): never participate
//! in the invariants the scheduler enforces, only report on them.

use std::fmt::Write as _;

use crate::graph::Graph;
use crate::schedulers::condition_split;
use crate::store::errors::Result;
use crate::store::model::ComputationState;
use crate::store::StoreGateway;

/// One node's current standing relative to its upstream predicate.
#[derive(Clone, Debug)]
pub struct OutstandingComputation {
    pub node_name: String,
    pub state: Option<ComputationState>,
    pub conditions_met: Vec<String>,
    pub conditions_not_met: Vec<String>,
}

/// Decompose every non-input node's predicate into satisfied/unsatisfied
/// dependency names, alongside its most recent computation state if any.
pub async fn outstanding_computations(
    store: &dyn StoreGateway,
    graph: &Graph,
    execution_id: &str,
) -> Result<Vec<OutstandingComputation>> {
    let snapshot = store.load_execution(execution_id).await?;
    let now = chrono::Utc::now().timestamp();
    let mut out = Vec::new();
    for node in graph.nodes() {
        if node.kind.is_input() {
            continue;
        }
        let Some((conditions_met, conditions_not_met)) =
            condition_split(&snapshot, graph, &node.name, now)
        else {
            continue;
        };
        let state = snapshot.latest_computation(&node.name).map(|c| c.state);
        out.push(OutstandingComputation {
            node_name: node.name.to_string(),
            state,
            conditions_met,
            conditions_not_met,
        });
    }
    Ok(out)
}

/// Human-readable dump of an execution's revision, node values, and
/// computation counts.
pub async fn summarize(store: &dyn StoreGateway, execution_id: &str) -> Result<String> {
    let snapshot = store.load_execution(execution_id).await?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "execution {} (graph {}, revision {}{})",
        snapshot.execution.id,
        snapshot.execution.graph_ref,
        snapshot.execution.revision,
        if snapshot.execution.is_archived() { ", archived" } else { "" }
    );
    let mut names: Vec<_> = snapshot.nodes.keys().collect();
    names.sort();
    for name in names {
        let instance = &snapshot.nodes[name];
        let attempts = snapshot.computations.get(name).map(|c| c.len()).unwrap_or(0);
        match instance.value.as_value() {
            Some(value) => {
                let _ = writeln!(
                    out,
                    "  {name}: set @rev {} = {value} ({attempts} attempt(s))",
                    instance.set_revision
                );
            }
            None => {
                let _ = writeln!(out, "  {name}: not_set ({attempts} attempt(s))");
            }
        }
    }
    Ok(out)
}

/// `graph TD` mermaid diagram: one node per `NodeDef`, one edge per
/// direct upstream reference in its predicate.
pub fn generate_mermaid_graph(graph: &Graph) -> String {
    let mut out = String::from("graph TD\n");
    for node in graph.nodes() {
        let _ = writeln!(out, "  {}[\"{} ({})\"]", node.name, node.name, node.kind);
        for dep in node.dependencies() {
            let _ = writeln!(out, "  {dep} --> {}", node.name);
        }
        if let Some(target) = &node.mutates {
            let _ = writeln!(out, "  {} -.mutates.-> {target}", node.name);
        }
    }
    out
}
