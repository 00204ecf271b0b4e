//! The scheduler: readiness evaluation, backoff policy, and the
//! dispatcher that turns ready candidates into completed computations
//! (SPEC_FULL.md §4.3–§4.5).

pub mod backoff;
pub mod dispatcher;
pub mod error;
pub mod readiness;

pub use backoff::{delay_for_attempt, eligible_at};
pub use dispatcher::{DispatchJob, Dispatcher, DispatcherTuning};
pub use error::SchedulerError;
pub use readiness::{condition_split, ready, ReadyCandidate};
