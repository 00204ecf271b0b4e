//! In-memory reference implementation of [`StoreGateway`], grounded in
//! the teacher's `InMemoryCheckpointer`: one process-local table guarded
//! by `parking_lot`, no serialization, used by default and by every test
//! in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::event_bus::RevisionBus;
use crate::store::errors::{Result, StoreError};
use crate::store::gateway::{ExecutionSnapshot, StoreGateway};
use crate::store::model::{
    Claim, Computation, ComputationOutcome, ComputationState, Execution, NodeInstance, NodeValue,
};
use crate::types::{GraphRef, NodeName, Revision, Value};
use crate::utils::id;

struct ExecutionRecord {
    execution: Execution,
    nodes: FxHashMap<NodeName, NodeInstance>,
    computations: FxHashMap<NodeName, Vec<Computation>>,
}

impl ExecutionRecord {
    fn bump(&mut self) -> Revision {
        self.execution.revision += 1;
        self.execution.revision
    }
}

struct ClaimRecord {
    execution_id: String,
    node_name: NodeName,
    attempt_index: usize,
}

/// An in-memory `StoreGateway`. Each execution gets its own lock so that
/// claim contention on one execution never blocks another.
pub struct InMemoryStore {
    executions: RwLock<FxHashMap<String, Arc<Mutex<ExecutionRecord>>>>,
    claims: Mutex<FxHashMap<String, ClaimRecord>>,
    bus: Arc<RevisionBus>,
}

impl InMemoryStore {
    pub fn new(bus: Arc<RevisionBus>) -> Self {
        Self {
            executions: RwLock::new(FxHashMap::default()),
            claims: Mutex::new(FxHashMap::default()),
            bus,
        }
    }

    fn record(&self, execution_id: &str) -> Result<Arc<Mutex<ExecutionRecord>>> {
        self.executions
            .read()
            .get(execution_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownExecution {
                execution_id: execution_id.to_string(),
            })
    }

    fn publish(&self, execution_id: &str, node_name: &NodeName, revision: Revision) {
        let _ = self
            .bus
            .publish_revision(execution_id.to_string(), node_name.clone(), revision);
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn create_execution(&self, graph_ref: GraphRef, nodes: Vec<NodeName>) -> Result<Execution> {
        let execution_id = id::new_execution_id();
        let execution = Execution {
            id: execution_id.clone(),
            graph_ref,
            revision: 1,
            archived_at: None,
        };
        let node_instances = nodes
            .into_iter()
            .map(|n| (n.clone(), NodeInstance::unset(n)))
            .collect();
        let record = ExecutionRecord {
            execution: execution.clone(),
            nodes: node_instances,
            computations: FxHashMap::default(),
        };
        self.executions
            .write()
            .insert(execution_id, Arc::new(Mutex::new(record)));
        Ok(execution)
    }

    async fn load_execution(&self, execution_id: &str) -> Result<ExecutionSnapshot> {
        let record = self.record(execution_id)?;
        let guard = record.lock();
        Ok(ExecutionSnapshot {
            execution: guard.execution.clone(),
            nodes: guard.nodes.clone(),
            computations: guard.computations.clone(),
        })
    }

    async fn write_value(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        value: Value,
    ) -> Result<Revision> {
        let record = self.record(execution_id)?;
        let mut guard = record.lock();
        if guard.execution.is_archived() {
            return Err(StoreError::ExecutionArchived {
                execution_id: execution_id.to_string(),
            });
        }
        let revision = guard.bump();
        let now = Utc::now().timestamp();
        let instance = guard
            .nodes
            .entry(node_name.clone())
            .or_insert_with(|| NodeInstance::unset(node_name.clone()));
        instance.value = NodeValue::Set(value);
        instance.set_revision = revision;
        instance.set_time = Some(now);
        drop(guard);
        self.publish(execution_id, node_name, revision);
        Ok(revision)
    }

    async fn claim_computation(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        deadline: DateTime<Utc>,
        ex_rev_seen: Revision,
        upstream_revisions: FxHashMap<NodeName, Revision>,
    ) -> Result<Claim> {
        let record = self.record(execution_id)?;
        let mut guard = record.lock();
        if guard.execution.is_archived() {
            return Err(StoreError::ExecutionArchived {
                execution_id: execution_id.to_string(),
            });
        }
        if guard.execution.revision != ex_rev_seen {
            return Err(StoreError::Conflict {
                execution_id: execution_id.to_string(),
                node_name: node_name.to_string(),
            });
        }
        let existing = guard.computations.entry(node_name.clone()).or_default();
        if existing.iter().any(Computation::is_computing) {
            return Err(StoreError::Conflict {
                execution_id: execution_id.to_string(),
                node_name: node_name.to_string(),
            });
        }
        let attempt_index = existing.len() as u32 + 1;
        let revision = guard.bump();
        let token = id::new_computation_id();
        let computation = Computation {
            id: token.clone(),
            execution_id: execution_id.to_string(),
            node_name: node_name.clone(),
            state: ComputationState::Computing,
            attempt_index,
            started_at: Utc::now(),
            deadline,
            completed_at: None,
            ex_revision_at_start: ex_rev_seen,
            upstream_revisions: upstream_revisions.clone(),
            result_payload: None,
            error_payload: None,
        };
        let index = existing.len();
        existing.push(computation);
        drop(guard);

        self.claims.lock().insert(
            token.clone(),
            ClaimRecord {
                execution_id: execution_id.to_string(),
                node_name: node_name.clone(),
                attempt_index: index,
            },
        );
        self.publish(execution_id, node_name, revision);

        Ok(Claim {
            token,
            execution_id: execution_id.to_string(),
            node_name: node_name.clone(),
            attempt_index,
            deadline,
            ex_revision_at_start: ex_rev_seen,
            upstream_revisions,
        })
    }

    async fn complete_computation(
        &self,
        token: &str,
        target: &NodeName,
        outcome: ComputationOutcome,
    ) -> Result<Revision> {
        let claim = self
            .claims
            .lock()
            .remove(token)
            .ok_or_else(|| StoreError::UnknownClaim {
                token: token.to_string(),
            })?;

        let record = self.record(&claim.execution_id)?;
        let mut guard = record.lock();
        if guard.execution.is_archived() {
            return Err(StoreError::ExecutionArchived {
                execution_id: claim.execution_id.clone(),
            });
        }

        let revision = guard.bump();
        let now = Utc::now();

        {
            let computations = guard
                .computations
                .get_mut(&claim.node_name)
                .ok_or_else(|| StoreError::UnknownNode {
                    execution_id: claim.execution_id.clone(),
                    node_name: claim.node_name.to_string(),
                })?;
            let computation = computations
                .get_mut(claim.attempt_index)
                .ok_or_else(|| StoreError::UnknownClaim {
                    token: token.to_string(),
                })?;
            computation.completed_at = Some(now);
            match &outcome {
                ComputationOutcome::Success(value) => {
                    computation.state = ComputationState::Success;
                    computation.result_payload = Some(value.clone());
                }
                ComputationOutcome::Failed(payload) => {
                    computation.state = ComputationState::Failed;
                    computation.error_payload = Some(payload.clone());
                }
                ComputationOutcome::Abandoned => computation.state = ComputationState::Abandoned,
                ComputationOutcome::Cancelled => computation.state = ComputationState::Cancelled,
            }
        }

        if let ComputationOutcome::Success(value) = &outcome {
            let instance = guard
                .nodes
                .entry(target.clone())
                .or_insert_with(|| NodeInstance::unset(target.clone()));
            instance.value = NodeValue::Set(value.clone());
            instance.set_revision = revision;
            instance.set_time = Some(now.timestamp());
        }

        drop(guard);
        self.publish(&claim.execution_id, target, revision);
        Ok(revision)
    }

    async fn list_live_executions(&self, cursor: Option<String>, limit: usize) -> Result<Vec<Execution>> {
        let executions = self.executions.read();
        let mut ids: Vec<&String> = executions.keys().collect();
        ids.sort();
        let start = match cursor {
            Some(after) => ids.iter().position(|id| **id == after).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        Ok(ids
            .into_iter()
            .skip(start)
            .filter_map(|id| executions.get(id))
            .map(|rec| rec.lock().execution.clone())
            .filter(|exec| !exec.is_archived())
            .take(limit)
            .collect())
    }

    async fn list_stale_computations(&self, threshold: DateTime<Utc>) -> Result<Vec<Computation>> {
        let executions = self.executions.read();
        let mut stale = Vec::new();
        for record in executions.values() {
            let guard = record.lock();
            for computations in guard.computations.values() {
                for computation in computations {
                    if computation.is_computing() && computation.deadline < threshold {
                        stale.push(computation.clone());
                    }
                }
            }
        }
        Ok(stale)
    }

    async fn archive_execution(&self, execution_id: &str) -> Result<()> {
        let record = self.record(execution_id)?;
        record.lock().execution.archived_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeName;

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(RevisionBus::default()))
    }

    #[tokio::test]
    async fn write_value_bumps_revision() {
        let store = store();
        let exec = store
            .create_execution(GraphRef::new("g", 1), vec![NodeName::from("a")])
            .await
            .unwrap();
        assert_eq!(exec.revision, 1);
        let rev = store
            .write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1))
            .await
            .unwrap();
        assert_eq!(rev, 2);
    }

    #[tokio::test]
    async fn claim_conflict_on_concurrent_attempt() {
        let store = store();
        let node = NodeName::from("n");
        let exec = store
            .create_execution(GraphRef::new("g", 1), vec![node.clone()])
            .await
            .unwrap();
        let deadline = Utc::now() + chrono::Duration::seconds(30);
        store
            .claim_computation(&exec.id, &node, deadline, exec.revision, FxHashMap::default())
            .await
            .unwrap();
        let snapshot = store.load_execution(&exec.id).await.unwrap();
        let err = store
            .claim_computation(
                &exec.id,
                &node,
                deadline,
                snapshot.execution.revision,
                FxHashMap::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn archived_execution_rejects_writes() {
        let store = store();
        let exec = store
            .create_execution(GraphRef::new("g", 1), vec![NodeName::from("a")])
            .await
            .unwrap();
        store.archive_execution(&exec.id).await.unwrap();
        let err = store
            .write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ExecutionArchived { .. }));
    }
}
