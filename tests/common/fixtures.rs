//! Graph and engine builders shared across the integration tests.

use std::sync::Arc;
use std::time::Duration;

use loomgraph::event_bus::RevisionBus;
use loomgraph::graph::Graph;
use loomgraph::graphs::{GraphBuilder, GraphRegistry, Predicate};
use loomgraph::runtimes::{Engine, EngineConfig};
use loomgraph::store::{InMemoryStore, StoreGateway};
use loomgraph::types::NodeName;

use super::nodes::{as_node, double_a, increment_b};

/// `a` (input) -> `b` (compute: doubles `a`).
pub fn doubler_graph() -> Graph {
    GraphBuilder::new()
        .add_input("a")
        .add_compute("b", Predicate::Provided(NodeName::from("a")), as_node(double_a))
        .build("doubler", 1)
        .unwrap()
}

/// `a` (input) -> `b` (doubles `a`) -> `c` (increments `b`).
pub fn cascade_graph() -> Graph {
    GraphBuilder::new()
        .add_input("a")
        .add_compute("b", Predicate::Provided(NodeName::from("a")), as_node(double_a))
        .add_compute(
            "c",
            Predicate::Provided(NodeName::from("b")),
            as_node(increment_b),
        )
        .build("cascade", 1)
        .unwrap()
}

/// A fast-ticking, low-latency config so tests don't wait on production
/// defaults (10s sweep interval, 30s attempt timeout).
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_worker_pool_size(2)
        .with_sweep_interval(Duration::from_millis(30))
        .with_default_attempt_timeout(Duration::from_secs(5))
        .with_backoff(Duration::from_millis(10), Duration::from_millis(200))
}

/// Wires a fresh in-memory store, registry, and bus behind an `Engine`
/// registered with a single graph, ready for `start_execution`.
pub fn engine_for(graph: Graph) -> Engine {
    let registry = Arc::new(GraphRegistry::new());
    registry.register(graph).unwrap();

    let bus = Arc::new(RevisionBus::default());
    let store: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new(Arc::clone(&bus)));

    Engine::new(registry, store, bus, test_config())
}
