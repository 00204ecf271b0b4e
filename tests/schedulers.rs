//! Readiness evaluation and backoff (SPEC_FULL.md §4.3–§4.4).

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use loomgraph::event_bus::RevisionBus;
use loomgraph::schedulers::{delay_for_attempt, eligible_at, ready};
use loomgraph::store::model::ComputationOutcome;
use loomgraph::store::{InMemoryStore, StoreGateway};
use loomgraph::types::{GraphRef, NodeName};

fn store() -> InMemoryStore {
    InMemoryStore::new(Arc::new(RevisionBus::default()))
}

#[tokio::test]
async fn compute_node_not_ready_until_dependency_is_set() {
    let store = store();
    let graph = common::doubler_graph();
    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(10), 5);
    assert!(candidates.is_empty(), "b has no value for a yet");

    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(21)).await.unwrap();
    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(10), 5);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].node_name, NodeName::from("b"));
}

#[tokio::test]
async fn in_flight_node_is_not_a_candidate_again() {
    let store = store();
    let graph = common::doubler_graph();
    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    store
        .claim_computation(
            &exec.id,
            &NodeName::from("b"),
            Utc::now() + chrono::Duration::seconds(30),
            snapshot.execution.revision,
            Default::default(),
        )
        .await
        .unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(10), 5);
    assert!(candidates.is_empty(), "b already has a computing attempt");
}

#[tokio::test]
async fn failed_attempt_becomes_a_candidate_again_after_backoff() {
    let store = store();
    let graph = common::doubler_graph();
    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let claim = store
        .claim_computation(
            &exec.id,
            &NodeName::from("b"),
            Utc::now() + chrono::Duration::seconds(30),
            snapshot.execution.revision,
            Default::default(),
        )
        .await
        .unwrap();
    store
        .complete_computation(&claim.token, &NodeName::from("b"), ComputationOutcome::Failed(serde_json::json!({})))
        .await
        .unwrap();

    let backoff_base = Duration::from_millis(20);
    let backoff_cap = Duration::from_millis(200);

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), backoff_base, backoff_cap, 5);
    assert!(candidates.is_empty(), "backoff window has not elapsed yet");

    tokio::time::sleep(backoff_base * 2).await;
    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), backoff_base, backoff_cap, 5);
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn upstream_advancing_makes_a_completed_node_a_candidate_again() {
    let store = store();
    let graph = common::doubler_graph();
    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let claim = store
        .claim_computation(
            &exec.id,
            &NodeName::from("b"),
            Utc::now() + chrono::Duration::seconds(30),
            snapshot.execution.revision,
            snapshot
                .node(&NodeName::from("a"))
                .map(|n| [(NodeName::from("a"), n.set_revision)].into_iter().collect())
                .unwrap(),
        )
        .await
        .unwrap();
    store
        .complete_computation(&claim.token, &NodeName::from("b"), ComputationOutcome::Success(serde_json::json!(2)))
        .await
        .unwrap();

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(10), 5);
    assert!(candidates.is_empty(), "b is up to date with a");

    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(2)).await.unwrap();
    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(10), 5);
    assert_eq!(candidates.len(), 1, "a advanced, b should recompute");
}

#[tokio::test]
async fn failed_attempt_stops_being_a_candidate_once_max_attempts_reached() {
    let store = store();
    let graph = common::doubler_graph();
    let exec = store
        .create_execution(GraphRef::new("doubler", 1), vec![NodeName::from("a"), NodeName::from("b")])
        .await
        .unwrap();
    store.write_value(&exec.id, &NodeName::from("a"), serde_json::json!(1)).await.unwrap();

    let backoff_base = Duration::from_millis(5);
    let backoff_cap = Duration::from_millis(20);
    let max_attempts = 2;

    // Exhaust both allowed attempts.
    for _ in 0..max_attempts {
        let snapshot = store.load_execution(&exec.id).await.unwrap();
        let claim = store
            .claim_computation(
                &exec.id,
                &NodeName::from("b"),
                Utc::now() + chrono::Duration::seconds(30),
                snapshot.execution.revision,
                Default::default(),
            )
            .await
            .unwrap();
        store
            .complete_computation(&claim.token, &NodeName::from("b"), ComputationOutcome::Failed(serde_json::json!({})))
            .await
            .unwrap();
        tokio::time::sleep(backoff_cap * 2).await;
    }

    let snapshot = store.load_execution(&exec.id).await.unwrap();
    let candidates = ready(&snapshot, &graph, Utc::now().timestamp(), backoff_base, backoff_cap, max_attempts);
    assert!(candidates.is_empty(), "b has exhausted its retries and should no longer be a candidate");
}

#[test]
fn backoff_doubles_until_capped() {
    let base = Duration::from_secs(1);
    let cap = Duration::from_secs(8);
    assert_eq!(delay_for_attempt(1, base, cap), Duration::from_secs(1));
    assert_eq!(delay_for_attempt(2, base, cap), Duration::from_secs(2));
    assert_eq!(delay_for_attempt(4, base, cap), cap);
}

#[test]
fn eligible_at_respects_the_delay_window() {
    let completed = Utc::now();
    let base = Duration::from_secs(1);
    let cap = Duration::from_secs(60);
    assert!(!eligible_at(completed, 1, base, cap, completed));
    assert!(eligible_at(completed, 1, base, cap, completed + chrono::Duration::seconds(2)));
}
