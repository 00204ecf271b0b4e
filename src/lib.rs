//! # loomgraph: a persistent dataflow execution engine
//!
//! Users declare a *graph* of named nodes — inputs, computes, schedules,
//! mutators — whose dependencies are value-level predicates over other
//! nodes. Starting an *execution* of a graph creates a durable record;
//! setting input values triggers computations whose conditions become
//! satisfied, and recomputation cascades when upstream values change.
//!
//! ## Core concepts
//!
//! - **Graph** / **NodeDef** — immutable declaration of nodes and their
//!   upstream predicates ([`graphs`]).
//! - **Execution** / **NodeInstance** / **Computation** — the durable
//!   state a [`store::StoreGateway`] persists.
//! - **Readiness** — the pure function deciding which computations are
//!   ready to run ([`schedulers::ready`]).
//! - **Dispatcher** / **Sweeper** — the worker pool and the periodic
//!   safety net that keeps executions moving ([`schedulers::Dispatcher`],
//!   [`sweeper::Sweeper`]).
//! - **Engine** — the façade tying the above together behind a small set
//!   of user-facing operations ([`runtimes::Engine`]).
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use loomgraph::graphs::{GraphBuilder, Predicate};
//! use loomgraph::node::{ComputeContext, FnNode, FunctionOutput, InputMap, UserFunctionError};
//! use loomgraph::types::NodeName;
//!
//! async fn double(inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
//!     let n = inputs.get(&NodeName::from("a")).and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(FunctionOutput::value(serde_json::json!(n * 2)))
//! }
//!
//! let graph = GraphBuilder::new()
//!     .add_input("a")
//!     .add_compute("b", Predicate::Provided(NodeName::from("a")), Arc::new(FnNode(double)))
//!     .build("doubler", 1)
//!     .unwrap();
//! assert!(graph.contains(&NodeName::from("b")));
//! ```
//!
//! ## Module guide
//!
//! - [`types`] — core identity types (`NodeName`, `NodeKind`, `GraphRef`, `Revision`).
//! - [`graph`] — the immutable `Graph`/`NodeDef` declaration.
//! - [`graphs`] — the builder, predicate language, registry, and validation.
//! - [`node`] — the `NodeFunction` trait user code implements.
//! - [`store`] — the transactional `StoreGateway` and its backends.
//! - [`schedulers`] — readiness evaluation, backoff, and the dispatcher.
//! - [`sweeper`] — the background reclaim/nudge task.
//! - [`event_bus`] — the revision notification bus.
//! - [`runtimes`] — the engine façade and diagnostics.
//! - [`channels`] — the error-ladder audit trail.
//! - [`telemetry`] — tracing setup and error-chain formatting.

pub mod channels;
pub mod event_bus;
pub mod graph;
pub mod graphs;
pub mod node;
pub mod runtimes;
pub mod schedulers;
pub mod store;
pub mod sweeper;
pub mod telemetry;
pub mod types;
pub mod utils;
