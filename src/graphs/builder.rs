//! Fluent construction of [`Graph`]s (SPEC_FULL.md §4.1), grounded in the
//! teacher's `GraphBuilder` pattern of accumulating nodes/edges before a
//! single `build`/`compile` validation pass.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::graph::{Graph, NodeDef};
use crate::graphs::predicate::Predicate;
use crate::graphs::validate::{validate, GraphError};
use crate::node::NodeFunction;
use crate::types::{GraphRef, NodeKind, NodeName};

/// Accumulates [`NodeDef`]s before a validating [`build`](Self::build) call.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: FxHashMap<NodeName, NodeDef>,
    order: Vec<NodeName>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, def: NodeDef) -> Self {
        let name = def.name.clone();
        if self.nodes.insert(name.clone(), def).is_none() {
            self.order.push(name);
        }
        self
    }

    /// An input node: written only via `set`, never computed.
    pub fn add_input(self, name: impl Into<NodeName>) -> Self {
        self.push(NodeDef {
            name: name.into(),
            kind: NodeKind::Input,
            upstream_predicate: Predicate::Always,
            function: None,
            mutates: None,
            attempt_timeout: None,
            max_attempts: None,
        })
    }

    /// A compute node: runs `function` once its predicate is satisfied
    /// and writes the result as its own value.
    pub fn add_compute(
        self,
        name: impl Into<NodeName>,
        predicate: Predicate,
        function: Arc<dyn NodeFunction>,
    ) -> Self {
        self.push(NodeDef {
            name: name.into(),
            kind: NodeKind::Compute,
            upstream_predicate: predicate,
            function: Some(function),
            mutates: None,
            attempt_timeout: None,
            max_attempts: None,
        })
    }

    /// A schedule-once node: `function` returns a future unix timestamp
    /// or `NoSchedule`; once fired, the node is never a candidate again.
    pub fn add_schedule_once(
        self,
        name: impl Into<NodeName>,
        predicate: Predicate,
        function: Arc<dyn NodeFunction>,
    ) -> Self {
        self.push(NodeDef {
            name: name.into(),
            kind: NodeKind::ScheduleOnce,
            upstream_predicate: predicate,
            function: Some(function),
            mutates: None,
            attempt_timeout: None,
            max_attempts: None,
        })
    }

    /// A recurring schedule node: each firing may produce a fresh future
    /// due time, making the node ready again.
    pub fn add_schedule_recurring(
        self,
        name: impl Into<NodeName>,
        predicate: Predicate,
        function: Arc<dyn NodeFunction>,
    ) -> Self {
        self.push(NodeDef {
            name: name.into(),
            kind: NodeKind::ScheduleRecurring,
            upstream_predicate: predicate,
            function: Some(function),
            mutates: None,
            attempt_timeout: None,
            max_attempts: None,
        })
    }

    /// A mutate node: its computation's result is written to `target`'s
    /// node instance, not its own (the mutate node itself only records
    /// attempt history).
    pub fn add_mutate(
        self,
        name: impl Into<NodeName>,
        predicate: Predicate,
        target: impl Into<NodeName>,
        function: Arc<dyn NodeFunction>,
    ) -> Self {
        self.push(NodeDef {
            name: name.into(),
            kind: NodeKind::Mutate,
            upstream_predicate: predicate,
            function: Some(function),
            mutates: Some(target.into()),
            attempt_timeout: None,
            max_attempts: None,
        })
    }

    /// Override the attempt timeout for the most recently added node.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        if let Some(last) = self.order.last() {
            if let Some(def) = self.nodes.get_mut(last) {
                def.attempt_timeout = Some(timeout);
            }
        }
        self
    }

    /// Override the retry cap for the most recently added node.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        if let Some(last) = self.order.last() {
            if let Some(def) = self.nodes.get_mut(last) {
                def.max_attempts = Some(max_attempts);
            }
        }
        self
    }

    /// Validate and freeze the graph under the given identity.
    ///
    /// Validation checks (SPEC_FULL.md §4.1): node names unique,
    /// dependencies refer to existing nodes, no self-dependency, mutate
    /// targets exist and are not inputs, schedule functions are present,
    /// and no cycle exists in the upstream-predicate DAG.
    pub fn build(self, name: impl Into<String>, version: u32) -> Result<Graph, GraphError> {
        let graph_ref = GraphRef::new(name, version);
        validate(&graph_ref, &self.nodes, &self.order)?;
        Ok(Graph {
            graph_ref,
            nodes: self.nodes,
            order: self.order,
        })
    }
}
