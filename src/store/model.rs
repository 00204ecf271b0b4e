//! The durable rows a [`super::gateway::StoreGateway`] persists
//! (SPEC_FULL.md §3, §6 "Persisted state layout").

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::{GraphRef, Revision, UnixSeconds, Value};

/// `not_set` | `set(payload)`, kept as an explicit tag rather than
/// `Option<Value>` so that `serde_json::Value::Null` (a legitimate node
/// payload) is never confused with absence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    NotSet,
    Set(Value),
}

impl NodeValue {
    pub fn is_set(&self) -> bool {
        matches!(self, NodeValue::Set(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            NodeValue::Set(v) => Some(v),
            NodeValue::NotSet => None,
        }
    }
}

/// One node's current state within an execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInstance {
    pub node_name: crate::types::NodeName,
    pub value: NodeValue,
    pub set_revision: Revision,
    pub set_time: Option<UnixSeconds>,
}

impl NodeInstance {
    pub fn unset(node_name: crate::types::NodeName) -> Self {
        Self {
            node_name,
            value: NodeValue::NotSet,
            set_revision: 0,
            set_time: None,
        }
    }
}

/// A computation's terminal or in-flight state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputationState {
    Computing,
    Success,
    Failed,
    Abandoned,
    Cancelled,
}

impl ComputationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ComputationState::Computing)
    }
}

/// One attempt at producing a node's value (SPEC_FULL.md §3 "Computation").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Computation {
    pub id: String,
    pub execution_id: String,
    pub node_name: crate::types::NodeName,
    pub state: ComputationState,
    pub attempt_index: u32,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ex_revision_at_start: Revision,
    pub upstream_revisions: FxHashMap<crate::types::NodeName, Revision>,
    pub result_payload: Option<Value>,
    pub error_payload: Option<Value>,
}

impl Computation {
    pub fn is_computing(&self) -> bool {
        self.state == ComputationState::Computing
    }
}

/// A live (or archived) instance of a graph (SPEC_FULL.md §3 "Execution").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub graph_ref: GraphRef,
    pub revision: Revision,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// The outcome a worker reports back through `complete_computation`.
#[derive(Clone, Debug)]
pub enum ComputationOutcome {
    Success(Value),
    Failed(Value),
    Abandoned,
    Cancelled,
}

/// A successful `claim_computation` call's handle: the caller uses this
/// to build the input map and to later call `complete_computation`.
#[derive(Clone, Debug)]
pub struct Claim {
    pub token: String,
    pub execution_id: String,
    pub node_name: crate::types::NodeName,
    pub attempt_index: u32,
    pub deadline: DateTime<Utc>,
    pub ex_revision_at_start: Revision,
    pub upstream_revisions: FxHashMap<crate::types::NodeName, Revision>,
}
