//! Graph definition, validation, and registry.
//!
//! [`builder::GraphBuilder`] accumulates node declarations and produces an
//! immutable [`crate::graph::Graph`] through a single validating
//! [`builder::GraphBuilder::build`] call. [`predicate::Predicate`] is the
//! upstream-condition language nodes gate on. [`validate`] holds the
//! structural checks `build` runs; [`registry::GraphRegistry`] is the
//! process-wide `(name, version)` lookup table graphs are published into.

pub mod builder;
pub mod predicate;
pub mod registry;
pub mod validate;

#[cfg(feature = "petgraph-compat")]
pub mod petgraph_compat;

pub use builder::GraphBuilder;
pub use predicate::{Predicate, PredicateContext};
pub use registry::GraphRegistry;
pub use validate::GraphError;
