//! Benchmarks for the readiness evaluator: scanning execution snapshots of
//! increasing width to find nodes whose predicate is satisfied and whose
//! last attempt is stale.

use std::time::Duration;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use loomgraph::graph::Graph;
use loomgraph::graphs::{GraphBuilder, Predicate};
use loomgraph::node::{ComputeContext, FnNode, FunctionOutput, InputMap, UserFunctionError};
use loomgraph::schedulers::ready;
use loomgraph::store::gateway::ExecutionSnapshot;
use loomgraph::store::model::{Execution, NodeValue, NodeInstance};
use loomgraph::types::{GraphRef, NodeName};

async fn no_op(_inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    Ok(FunctionOutput::value(serde_json::Value::Null))
}

/// `source (input) -> worker_0..worker_{width-1}`, all depending on `source`
/// alone, matching the dispatcher's most common shape: one upstream write
/// fanning out to many candidates at once.
fn build_fanout_graph(width: usize) -> Graph {
    let mut builder = GraphBuilder::new().add_input("source");
    for i in 0..width {
        builder = builder.add_compute(
            format!("worker_{i}"),
            Predicate::Provided(NodeName::from("source")),
            std::sync::Arc::new(FnNode(no_op)),
        );
    }
    builder.build("bench", 1).expect("build should succeed")
}

/// An `ExecutionSnapshot` with `source` set and every worker either never
/// computed (`warm = false`) or already up to date with `source`
/// (`warm = true`) — the two ends of the readiness scan's workload.
fn snapshot_for(graph: &Graph, warm: bool) -> ExecutionSnapshot {
    let execution = Execution {
        id: "bench-exec".to_string(),
        graph_ref: GraphRef::new("bench", 1),
        revision: 1,
        archived_at: None,
    };

    let mut nodes = rustc_hash::FxHashMap::default();
    nodes.insert(
        NodeName::from("source"),
        NodeInstance {
            node_name: NodeName::from("source"),
            value: NodeValue::Set(serde_json::json!(1)),
            set_revision: 1,
            set_time: Some(Utc::now().timestamp()),
        },
    );

    let mut computations = rustc_hash::FxHashMap::default();
    for node in graph.nodes() {
        if node.name == NodeName::from("source") {
            continue;
        }
        if warm {
            nodes.insert(
                node.name.clone(),
                NodeInstance {
                    node_name: node.name.clone(),
                    value: NodeValue::Set(serde_json::json!(1)),
                    set_revision: 1,
                    set_time: Some(Utc::now().timestamp()),
                },
            );
            let upstream_revisions = [(NodeName::from("source"), 1)].into_iter().collect();
            computations.insert(
                node.name.clone(),
                vec![loomgraph::store::model::Computation {
                    id: format!("{}-c1", node.name),
                    execution_id: "bench-exec".to_string(),
                    node_name: node.name.clone(),
                    state: loomgraph::store::model::ComputationState::Success,
                    attempt_index: 1,
                    started_at: Utc::now(),
                    deadline: Utc::now(),
                    completed_at: Some(Utc::now()),
                    ex_revision_at_start: 1,
                    upstream_revisions,
                    result_payload: Some(serde_json::json!(1)),
                    error_payload: None,
                }],
            );
        } else {
            nodes.insert(node.name.clone(), NodeInstance::unset(node.name.clone()));
        }
    }

    ExecutionSnapshot {
        execution,
        nodes,
        computations,
    }
}

fn bench_readiness_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("readiness_eval_cold");

    for width in [10, 100, 500, 1000] {
        let graph = build_fanout_graph(width);
        let snapshot = snapshot_for(&graph, false);
        group.bench_with_input(BenchmarkId::new("fanout", width), &(graph, snapshot), |b, (graph, snapshot)| {
            b.iter(|| ready(snapshot, graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(60), 5));
        });
    }

    group.finish();
}

fn bench_readiness_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("readiness_eval_warm");

    for width in [10, 100, 500, 1000] {
        let graph = build_fanout_graph(width);
        let snapshot = snapshot_for(&graph, true);
        group.bench_with_input(BenchmarkId::new("fanout", width), &(graph, snapshot), |b, (graph, snapshot)| {
            b.iter(|| ready(snapshot, graph, Utc::now().timestamp(), Duration::from_secs(1), Duration::from_secs(60), 5));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_readiness_cold, bench_readiness_warm);
criterion_main!(benches);
