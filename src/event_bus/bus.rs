//! The revision & notification bus (SPEC_FULL.md §4.6): a thin façade
//! over [`EventHub`] that knows how to filter the shared broadcast stream
//! down to "anything changed for this execution" and "this node moved
//! past revision N", so callers never see another execution's traffic.

use std::sync::Arc;
use std::time::Duration;

use super::emitter::EmitterError;
use super::event::Event;
use super::hub::EventHub;
use crate::types::{NodeName, Revision};

const DEFAULT_BUFFER_CAPACITY: usize = 4096;

pub struct RevisionBus {
    hub: Arc<EventHub>,
}

impl Default for RevisionBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl RevisionBus {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hub: EventHub::new(capacity),
        }
    }

    pub fn publish(&self, event: Event) -> Result<(), EmitterError> {
        self.hub.publish(event)
    }

    pub fn publish_revision(
        &self,
        execution_id: impl Into<String>,
        node_name: NodeName,
        new_revision: Revision,
    ) -> Result<(), EmitterError> {
        self.publish(Event::revision(execution_id, node_name, new_revision))
    }

    /// Block until *any* revision event for `execution_id` arrives, or
    /// `timeout` elapses. Used by the dispatcher's idle wait: rather than
    /// polling readiness on a fixed interval, it wakes as soon as
    /// something in the execution changes.
    pub async fn wait_any(&self, execution_id: &str, timeout: Duration) -> bool {
        let mut stream = self.hub.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match stream.next_timeout(remaining).await {
                Some(event) if event.execution_id() == Some(execution_id) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    }

    /// Block until `node_name`'s revision advances past `since`, or
    /// `timeout` elapses. Returns the new revision if one arrived.
    pub async fn wait_new(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        since: Revision,
        timeout: Duration,
    ) -> Option<Revision> {
        let mut stream = self.hub.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match stream.next_timeout(remaining).await {
                Some(Event::Revision(r))
                    if r.execution_id == execution_id
                        && &r.node_name == node_name
                        && r.new_revision > since =>
                {
                    return Some(r.new_revision)
                }
                Some(_) => continue,
                None => return None,
            }
        }
    }

    pub fn metrics(&self) -> super::hub::EventHubMetrics {
        self.hub.metrics()
    }

    pub fn subscribe(&self) -> super::hub::EventStream {
        self.hub.subscribe()
    }
}
