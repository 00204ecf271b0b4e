//! Event bus: a broadcast hub (`hub`) and the revision-aware façade
//! (`bus`) the engine and sweeper publish to and wait on.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod hub;

pub use bus::RevisionBus;
pub use emitter::{EmitterError, EventEmitter};
pub use event::{DiagnosticEvent, Event, RevisionEvent};
pub use hub::{EventHub, EventHubMetrics, EventStream, HubEmitter};
