//! The persistent store gateway (SPEC_FULL.md §4.2): the transactional
//! boundary that owns executions, node instances, and computation
//! attempts. [`gateway::StoreGateway`] is the trait every backend
//! implements; [`memory::InMemoryStore`] is the always-available
//! default, and `sqlite`/`postgres` are durable alternatives behind
//! their respective features.

pub mod errors;
pub mod gateway;
pub mod memory;
pub mod model;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use errors::StoreError;
pub use gateway::{ExecutionSnapshot, StoreGateway};
pub use memory::InMemoryStore;
pub use model::{Claim, Computation, ComputationOutcome, ComputationState, Execution, NodeInstance, NodeValue};
