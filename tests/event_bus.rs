//! The revision & notification bus (SPEC_FULL.md §4.7).

use std::sync::Arc;
use std::time::Duration;

use loomgraph::event_bus::RevisionBus;
use loomgraph::types::NodeName;

#[tokio::test]
async fn wait_new_resolves_once_the_matching_revision_is_published() {
    let bus = Arc::new(RevisionBus::default());
    let node = NodeName::from("b");

    let waiter = tokio::spawn({
        let bus = Arc::clone(&bus);
        let node = node.clone();
        async move { bus.wait_new("exec-1", &node, 0, Duration::from_millis(200)).await }
    });

    // Give the spawned task a chance to subscribe before we publish;
    // the broadcast channel only delivers to already-subscribed receivers.
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.publish_revision("exec-1", node.clone(), 3).unwrap();

    assert_eq!(waiter.await.unwrap(), Some(3));
}

#[tokio::test]
async fn wait_new_ignores_other_executions_and_lower_revisions() {
    let bus = Arc::new(RevisionBus::default());
    let node = NodeName::from("b");

    let waiter = tokio::spawn({
        let bus = Arc::clone(&bus);
        let node = node.clone();
        async move { bus.wait_new("exec-1", &node, 5, Duration::from_millis(200)).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.publish_revision("exec-2", node.clone(), 9).unwrap();
    bus.publish_revision("exec-1", node.clone(), 4).unwrap();
    bus.publish_revision("exec-1", NodeName::from("other"), 9).unwrap();
    bus.publish_revision("exec-1", node.clone(), 6).unwrap();

    assert_eq!(waiter.await.unwrap(), Some(6));
}

#[tokio::test]
async fn wait_new_times_out_when_nothing_arrives() {
    let bus = RevisionBus::default();
    let node = NodeName::from("never");
    let result = bus.wait_new("exec-1", &node, 0, Duration::from_millis(30)).await;
    assert_eq!(result, None);
}

#[tokio::test]
async fn wait_any_returns_as_soon_as_the_execution_has_any_event() {
    let bus = Arc::new(RevisionBus::default());

    let waiter = tokio::spawn({
        let bus = Arc::clone(&bus);
        async move { bus.wait_any("exec-7", Duration::from_millis(200)).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.publish_revision("exec-7", NodeName::from("x"), 1).unwrap();

    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn wait_any_times_out_with_no_events_for_the_execution() {
    let bus = RevisionBus::default();
    assert!(!bus.wait_any("exec-quiet", Duration::from_millis(30)).await);
}
