//! Core identity types for the dataflow execution engine.
//!
//! These are the fundamental domain concepts that describe what a graph
//! node *is*, independent of how it is stored or scheduled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unique name of a node within a graph.
///
/// Interned as a plain `String` rather than a symbol table entry: graphs
/// are small (tens to low hundreds of nodes) and names are compared far
/// less often than they are hashed and cloned into maps.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The two system nodes every graph carries implicitly.
pub const EXECUTION_ID_NODE: &str = "execution_id";
pub const LAST_UPDATED_AT_NODE: &str = "last_updated_at";

/// Identifies how a node's value comes to be.
///
/// The dispatcher branches on this tag; each branch is a small, closed
/// set of behaviors (see `schedulers::dispatcher`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Written directly by the caller via `set`; never computed.
    Input,
    /// Computed from upstream values; writes its own value on success.
    Compute,
    /// Computed once; on success its value is a future unix timestamp,
    /// or the node records `NoSchedule` and is never ready again.
    ScheduleOnce,
    /// Like `ScheduleOnce`, but a fresh due time may be produced after
    /// each firing, so the node can become ready again.
    ScheduleRecurring,
    /// Computed, but the result is written to `mutates`'s target node
    /// rather than to the mutate node's own instance.
    Mutate,
}

impl NodeKind {
    pub fn is_input(&self) -> bool {
        matches!(self, NodeKind::Input)
    }

    pub fn is_schedule(&self) -> bool {
        matches!(self, NodeKind::ScheduleOnce | NodeKind::ScheduleRecurring)
    }

    pub fn computes_own_value(&self) -> bool {
        !matches!(self, NodeKind::Input | NodeKind::Mutate)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Input => "input",
            NodeKind::Compute => "compute",
            NodeKind::ScheduleOnce => "schedule_once",
            NodeKind::ScheduleRecurring => "schedule_recurring",
            NodeKind::Mutate => "mutate",
        };
        write!(f, "{s}")
    }
}

/// Opaque node payload. The scheduler never inspects it except to pull a
/// unix-seconds integer out of a schedule node's value.
pub type Value = serde_json::Value;

/// Identity of a graph: content-addressed by name and version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphRef {
    pub name: String,
    pub version: u32,
}

impl GraphRef {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Monotonic per-execution revision counter.
pub type Revision = u64;

/// Unix seconds, used for `set_time`/`started_at`/schedule due-times.
pub type UnixSeconds = i64;
