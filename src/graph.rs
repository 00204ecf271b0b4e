//! Graph definition: the immutable declaration of nodes and their
//! dependency predicates (SPEC_FULL.md §3, §4.1).
//!
//! Build graphs with [`graphs::builder::GraphBuilder`]; look them up by
//! `(name, version)` through [`graphs::registry::GraphRegistry`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::graphs::predicate::Predicate;
use crate::node::NodeFunction;
use crate::types::{GraphRef, NodeKind, NodeName};

/// One node's static declaration within a graph.
pub struct NodeDef {
    pub name: NodeName,
    pub kind: NodeKind,
    pub upstream_predicate: Predicate,
    /// Absent for `Input` nodes; required for every other kind.
    pub function: Option<Arc<dyn NodeFunction>>,
    /// Only meaningful for `Mutate` nodes: the node whose value this
    /// node's computation writes to.
    pub mutates: Option<NodeName>,
    /// Attempt timeout override; falls back to `EngineConfig::default_attempt_timeout`.
    pub attempt_timeout: Option<std::time::Duration>,
    /// Retry cap override; falls back to `EngineConfig::max_attempts_per_node`.
    pub max_attempts: Option<u32>,
}

impl NodeDef {
    /// The direct upstream node names this node's predicate depends on,
    /// plus (for `Mutate`) nothing extra — the mutate target is an
    /// *output*, not an input dependency.
    pub fn dependencies(&self) -> Vec<NodeName> {
        self.upstream_predicate.referenced_nodes()
    }
}

/// An immutable, validated graph: identity is `(name, version)`.
pub struct Graph {
    pub graph_ref: GraphRef,
    pub(crate) nodes: FxHashMap<NodeName, NodeDef>,
    /// Declaration order, preserved for deterministic iteration (diagnostics,
    /// mermaid rendering, readiness-evaluator scan order).
    pub(crate) order: Vec<NodeName>,
}

impl Graph {
    pub fn graph_ref(&self) -> &GraphRef {
        &self.graph_ref
    }

    pub fn node(&self, name: &NodeName) -> Option<&NodeDef> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.order.iter().map(move |n| &self.nodes[n])
    }

    pub fn node_names(&self) -> impl Iterator<Item = &NodeName> {
        self.order.iter()
    }

    pub fn contains(&self, name: &NodeName) -> bool {
        self.nodes.contains_key(name)
    }
}
