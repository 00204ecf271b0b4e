use std::fmt;
use thiserror::Error;

use super::event::Event;

/// An abstract event emitter the dispatcher and sweeper hold onto without
/// depending on the hub's concrete broadcast type.
pub trait EventEmitter: Send + Sync + fmt::Debug {
    fn emit(&self, event: Event) -> Result<(), EmitterError>;
}

#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event hub closed")]
    Closed,
    #[error("event lag exceeded buffer; dropped {0} messages")]
    Lagged(usize),
}
