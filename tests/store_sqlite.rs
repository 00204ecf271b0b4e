//! Durability test for the `sqlite`-backed store gateway: writes land in a
//! real file-backed database, and state survives reconnecting to that same
//! file after the original connection is dropped (standing in for a process
//! restart against a durable store).

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::Utc;
use rustc_hash::FxHashMap;

use loomgraph::event_bus::RevisionBus;
use loomgraph::store::{ComputationOutcome, StoreGateway};
use loomgraph::store::model::{ComputationState, NodeValue};
use loomgraph::store::sqlite::SqliteStore;
use loomgraph::types::{GraphRef, NodeName};

#[tokio::test]
async fn durable_across_reconnect() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("loomgraph_test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let bus = Arc::new(RevisionBus::default());
    let store1 = SqliteStore::connect(&database_url, Arc::clone(&bus)).await.unwrap();

    let execution = store1
        .create_execution(
            GraphRef::new("durable", 1),
            vec![NodeName::from("a"), NodeName::from("b")],
        )
        .await
        .unwrap();

    store1
        .write_value(&execution.id, &NodeName::from("a"), serde_json::json!(21))
        .await
        .unwrap();

    let snapshot_before = store1.load_execution(&execution.id).await.unwrap();
    let before_revision = snapshot_before.execution.revision;

    let claim = store1
        .claim_computation(
            &execution.id,
            &NodeName::from("b"),
            Utc::now() + chrono::Duration::seconds(30),
            before_revision,
            FxHashMap::default(),
        )
        .await
        .unwrap();

    store1
        .complete_computation(&claim.token, &NodeName::from("b"), ComputationOutcome::Success(serde_json::json!(42)))
        .await
        .unwrap();

    drop(store1);

    // Reconnect to the same file: embedded migrations must be idempotent
    // (`CREATE TABLE IF NOT EXISTS`) and everything written above must
    // still be there.
    let store2 = SqliteStore::connect(&database_url, Arc::clone(&bus)).await.unwrap();
    let snapshot = store2.load_execution(&execution.id).await.unwrap();

    let a = snapshot.node(&NodeName::from("a")).unwrap();
    assert_eq!(a.value, NodeValue::Set(serde_json::json!(21)));

    let b = snapshot.node(&NodeName::from("b")).unwrap();
    assert_eq!(b.value, NodeValue::Set(serde_json::json!(42)));

    let b_computations = snapshot.computations.get(&NodeName::from("b")).cloned().unwrap_or_default();
    assert_eq!(b_computations.len(), 1);
    assert_eq!(b_computations[0].state, ComputationState::Success);

    assert!(snapshot.execution.revision > before_revision);
}

#[tokio::test]
async fn archived_execution_rejects_writes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("loomgraph_archive_test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let bus = Arc::new(RevisionBus::default());
    let store = SqliteStore::connect(&database_url, bus).await.unwrap();

    let execution = store
        .create_execution(GraphRef::new("durable", 1), vec![NodeName::from("a")])
        .await
        .unwrap();

    store.archive_execution(&execution.id).await.unwrap();

    let result = store.write_value(&execution.id, &NodeName::from("a"), serde_json::json!(1)).await;
    assert!(result.is_err());
}
