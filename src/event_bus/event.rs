//! The payloads published on the engine's [`super::hub::EventHub`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{NodeName, Revision};

pub const EXECUTION_CLOSED_SCOPE: &str = "__loomgraph_execution_closed__";

/// Everything the hub carries: a node's value changing, or a free-form
/// diagnostic line from the sweeper/dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    Revision(RevisionEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn revision(execution_id: impl Into<String>, node_name: NodeName, new_revision: Revision) -> Self {
        Event::Revision(RevisionEvent {
            execution_id: execution_id.into(),
            node_name,
            new_revision,
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Revision(r) => Some(r.execution_id.as_str()),
            Event::Diagnostic(d) => Some(d.scope.as_str()),
        }
    }

    /// The execution this event pertains to, if any — used by
    /// [`super::bus::RevisionBus::wait_any`]/`wait_new` to filter a shared
    /// broadcast stream down to one execution's notifications.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Event::Revision(r) => Some(r.execution_id.as_str()),
            Event::Diagnostic(_) => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Revision(r) => write!(
                f,
                "[{}] {} -> rev {}",
                r.execution_id, r.node_name, r.new_revision
            ),
            Event::Diagnostic(d) => write!(f, "[{}] {}", d.scope, d.message),
        }
    }
}

/// Published every time a node's value is written, whatever the cause
/// (input `set`, a successful compute, a sweeper-fired schedule, or a
/// mutate node's target write).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionEvent {
    pub execution_id: String,
    pub node_name: NodeName,
    pub new_revision: Revision,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}

/// Marker timestamp type reused by sinks/tests that want to stamp events
/// outside the hub itself.
pub type EventTimestamp = DateTime<Utc>;

pub fn now() -> EventTimestamp {
    Utc::now()
}
