//! The engine façade and its read-only diagnostics (SPEC_FULL.md §4.8–§4.9):
//! the thin orchestration layer that wires the graph registry, store,
//! dispatcher, sweeper, and revision bus together behind the operations
//! in §6, the way the teacher's `AppRunner` sits in front of its own
//! scheduler and checkpointer.

pub mod config;
pub mod diagnostics;
pub mod engine;

pub use config::EngineConfig;
pub use diagnostics::{generate_mermaid_graph, outstanding_computations, summarize, OutstandingComputation};
pub use engine::{Engine, EngineError, ValueOutcome, WaitMode};
