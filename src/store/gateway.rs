//! The `StoreGateway` trait: all scheduler-visible state lives behind
//! this transactional boundary (SPEC_FULL.md §4.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::store::errors::Result;
use crate::store::model::{Claim, Computation, ComputationOutcome, Execution, NodeInstance};
use crate::types::{GraphRef, NodeName, Revision, Value};

/// A point-in-time view of one execution's node instances, handed to the
/// readiness evaluator and to the dispatcher's input-map construction.
#[derive(Clone, Debug)]
pub struct ExecutionSnapshot {
    pub execution: Execution,
    pub nodes: FxHashMap<NodeName, NodeInstance>,
    pub computations: FxHashMap<NodeName, Vec<Computation>>,
}

impl ExecutionSnapshot {
    pub fn node(&self, name: &NodeName) -> Option<&NodeInstance> {
        self.nodes.get(name)
    }

    pub fn latest_computation(&self, name: &NodeName) -> Option<&Computation> {
        self.computations.get(name).and_then(|cs| cs.last())
    }

    pub fn in_flight(&self, name: &NodeName) -> bool {
        self.computations
            .get(name)
            .is_some_and(|cs| cs.iter().any(Computation::is_computing))
    }
}

/// Transactional operations over executions, node instances, and
/// computation attempts. Implementations must serialize the
/// claim/complete critical section per `(execution_id, node_name)`
/// (SPEC_FULL.md §4.2, §5 "Mutual exclusion").
#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn create_execution(&self, graph_ref: GraphRef, nodes: Vec<NodeName>) -> Result<Execution>;

    async fn load_execution(&self, execution_id: &str) -> Result<ExecutionSnapshot>;

    /// Write a value to `node_name`, bumping the execution's revision.
    /// Fails with `ExecutionArchived` if the execution has been archived.
    async fn write_value(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        value: Value,
    ) -> Result<Revision>;

    /// Insert a `Computation` row in `Computing`, but only if no other
    /// computation for `(execution_id, node_name)` is currently
    /// `Computing` and the execution's revision still equals
    /// `ex_rev_seen`. Returns `Conflict` otherwise.
    async fn claim_computation(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        deadline: DateTime<Utc>,
        ex_rev_seen: Revision,
        upstream_revisions: FxHashMap<NodeName, Revision>,
    ) -> Result<Claim>;

    /// Apply `outcome` to the computation identified by `token`. On
    /// `Success`, `target` (the mutate node's target, or the node itself
    /// for compute/schedule nodes) receives the value in the same
    /// transaction as the state transition and revision bump.
    async fn complete_computation(
        &self,
        token: &str,
        target: &NodeName,
        outcome: ComputationOutcome,
    ) -> Result<Revision>;

    async fn list_live_executions(&self, cursor: Option<String>, limit: usize) -> Result<Vec<Execution>>;

    async fn list_stale_computations(&self, threshold: DateTime<Utc>) -> Result<Vec<Computation>>;

    async fn archive_execution(&self, execution_id: &str) -> Result<()>;
}
