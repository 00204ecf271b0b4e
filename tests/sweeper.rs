//! The background sweeper (SPEC_FULL.md §4.6): reclaim of timed-out
//! attempts and readiness nudges across live executions.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use loomgraph::event_bus::RevisionBus;
use loomgraph::schedulers::{Dispatcher, DispatcherTuning};
use loomgraph::store::model::ComputationState;
use loomgraph::store::{InMemoryStore, StoreGateway};
use loomgraph::sweeper::{StaticGraphLookup, Sweeper, SweeperTuning};
use loomgraph::types::{GraphRef, NodeName};

fn tuning() -> SweeperTuning {
    SweeperTuning {
        interval: Duration::from_millis(20),
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(100),
        max_attempts_default: 5,
    }
}

#[tokio::test]
async fn reclaim_marks_overdue_computations_abandoned() {
    let bus = Arc::new(RevisionBus::default());
    let store: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new(Arc::clone(&bus)));
    let graph = Arc::new(common::doubler_graph());
    let lookup = Arc::new(StaticGraphLookup::new(vec![Arc::clone(&graph)]));
    let dispatcher = Dispatcher::spawn(
        1,
        Arc::clone(&store),
        Arc::clone(&bus),
        DispatcherTuning {
            default_attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
            max_attempts_default: 5,
        },
    );
    let sweeper = Sweeper::new(Arc::clone(&store), dispatcher, lookup, tuning());

    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let already_overdue = Utc::now() - chrono::Duration::seconds(1);
    store
        .claim_computation(&exec.id, &NodeName::from("b"), already_overdue, snapshot.execution.revision, Default::default())
        .await
        .unwrap();

    sweeper.tick().await;

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let computation = snapshot.latest_computation(&NodeName::from("b")).unwrap();
    assert_eq!(computation.state, ComputationState::Abandoned);
}

#[tokio::test]
async fn nudge_enqueues_ready_candidates_for_every_live_execution() {
    let bus = Arc::new(RevisionBus::default());
    let store: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new(Arc::clone(&bus)));
    let graph = Arc::new(common::doubler_graph());
    let lookup = Arc::new(StaticGraphLookup::new(vec![Arc::clone(&graph)]));
    let dispatcher = Dispatcher::spawn(
        2,
        Arc::clone(&store),
        Arc::clone(&bus),
        DispatcherTuning {
            default_attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
            max_attempts_default: 5,
        },
    );
    let sweeper = Sweeper::new(Arc::clone(&store), dispatcher, lookup, tuning());

    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(21)).await.unwrap();

    sweeper.tick().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let b = snapshot.node(&NodeName::from("b")).unwrap();
    assert_eq!(b.value.as_value(), Some(&serde_json::json!(42)));
}

#[tokio::test]
async fn archived_executions_are_excluded_from_nudge() {
    let bus = Arc::new(RevisionBus::default());
    let store: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new(Arc::clone(&bus)));
    let graph = Arc::new(common::doubler_graph());
    let lookup = Arc::new(StaticGraphLookup::new(vec![Arc::clone(&graph)]));
    let dispatcher = Dispatcher::spawn(
        1,
        Arc::clone(&store),
        Arc::clone(&bus),
        DispatcherTuning {
            default_attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
            max_attempts_default: 5,
        },
    );
    let sweeper = Sweeper::new(Arc::clone(&store), dispatcher, lookup, tuning());

    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();
    store.archive_execution(&exec.id).await.unwrap();

    sweeper.tick().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    assert!(snapshot.node(&NodeName::from("b")).unwrap().value.as_value().is_none());
}
