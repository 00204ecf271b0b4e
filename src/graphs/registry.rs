//! Content-addressed graph registry (SPEC_FULL.md §4.1): graphs are looked
//! up by `(name, version)`, and redefining an existing pair with a
//! different node set is rejected rather than silently shadowed.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::graph::Graph;
use crate::graphs::validate::GraphError;
use crate::types::GraphRef;

/// A fingerprint cheap enough to compare on every `register` call: the
/// sorted node names and kinds. Two registrations under the same
/// `(name, version)` are "the same definition" iff their fingerprints
/// match; this catches accidental redefinition without requiring
/// `NodeDef`/`Predicate` to implement `PartialEq` end to end (closures
/// inside `Arc<dyn NodeFunction>` cannot be compared).
fn fingerprint(graph: &Graph) -> Vec<(String, &'static str)> {
    let mut out: Vec<(String, &'static str)> = graph
        .nodes()
        .map(|n| (n.name.to_string(), kind_tag(n.kind)))
        .collect();
    out.sort();
    out
}

fn kind_tag(kind: crate::types::NodeKind) -> &'static str {
    use crate::types::NodeKind::*;
    match kind {
        Input => "input",
        Compute => "compute",
        ScheduleOnce => "schedule_once",
        ScheduleRecurring => "schedule_recurring",
        Mutate => "mutate",
    }
}

struct Entry {
    graph: Arc<Graph>,
    fingerprint: Vec<(String, &'static str)>,
}

/// Process-wide table of known graphs, keyed by identity.
#[derive(Default)]
pub struct GraphRegistry {
    entries: RwLock<FxHashMap<GraphRef, Entry>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `graph` under its own `graph_ref`. Idempotent for repeat
    /// registration of an identical definition; errors if `graph_ref` is
    /// already bound to a different one.
    pub fn register(&self, graph: Graph) -> Result<Arc<Graph>, GraphError> {
        let graph = Arc::new(graph);
        let fp = fingerprint(&graph);
        let graph_ref = graph.graph_ref().clone();

        let mut entries = self.entries.write();
        match entries.get(&graph_ref) {
            Some(existing) if existing.fingerprint == fp => Ok(existing.graph.clone()),
            Some(_) => Err(GraphError::GraphMismatch { graph_ref }),
            None => {
                entries.insert(
                    graph_ref,
                    Entry {
                        graph: graph.clone(),
                        fingerprint: fp,
                    },
                );
                Ok(graph)
            }
        }
    }

    pub fn lookup(&self, name: &str, version: u32) -> Option<Arc<Graph>> {
        let graph_ref = GraphRef::new(name, version);
        self.entries.read().get(&graph_ref).map(|e| e.graph.clone())
    }

    pub fn contains(&self, graph_ref: &GraphRef) -> bool {
        self.entries.read().contains_key(graph_ref)
    }
}
