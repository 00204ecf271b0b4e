//! Benchmarks for graph construction and validation: building and
//! `GraphBuilder::build`-ing linear, fan-out, and layered dependency graphs
//! of increasing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use loomgraph::graphs::{GraphBuilder, GraphRegistry, Predicate};
use loomgraph::node::{ComputeContext, FnNode, FunctionOutput, InputMap, UserFunctionError};
use loomgraph::types::NodeName;

async fn no_op(_inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    Ok(FunctionOutput::value(serde_json::Value::Null))
}

/// `a0 (input) -> a1 -> a2 -> ... -> aN`, each depending only on its
/// immediate predecessor.
fn build_linear_graph(node_count: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new().add_input("a0");
    for i in 1..=node_count {
        let prev = NodeName::from(format!("a{}", i - 1));
        builder = builder.add_compute(format!("a{i}"), Predicate::Provided(prev), std::sync::Arc::new(FnNode(no_op)));
    }
    builder
}

/// One input feeding `width` independent compute nodes.
fn build_fanout_graph(width: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new().add_input("source");
    for i in 0..width {
        builder = builder.add_compute(
            format!("worker_{i}"),
            Predicate::Provided(NodeName::from("source")),
            std::sync::Arc::new(FnNode(no_op)),
        );
    }
    builder
}

/// `depth` layers of `width` nodes each, every node in a layer depending on
/// one node in the layer before it.
fn build_layered_graph(depth: usize, width: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new().add_input("root");
    for layer in 0..depth {
        for slot in 0..width {
            let name = format!("l{layer}_n{slot}");
            let dep = if layer == 0 {
                NodeName::from("root")
            } else {
                NodeName::from(format!("l{}_n{}", layer - 1, slot % width))
            };
            builder = builder.add_compute(name, Predicate::Provided(dep), std::sync::Arc::new(FnNode(no_op)));
        }
    }
    builder
}

fn bench_graph_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_compile");

    for size in [10, 50, 100, 200] {
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &size| {
            b.iter(|| build_linear_graph(size).build("bench", 1).expect("build should succeed"));
        });
    }

    for width in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("fanout", width), &width, |b, &width| {
            b.iter(|| build_fanout_graph(width).build("bench", 1).expect("build should succeed"));
        });
    }

    for (depth, width) in [(5, 10), (10, 10), (5, 20)] {
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{depth}x{width}")),
            &(depth, width),
            |b, &(depth, width)| {
                b.iter(|| build_layered_graph(depth, width).build("bench", 1).expect("build should succeed"));
            },
        );
    }

    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_registration");

    // Graph doesn't implement Clone, so each batch rebuilds its own graph
    // alongside a fresh registry rather than registering the same graph
    // into many registries.
    for size in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("register", size), &size, |b, &size| {
            b.iter_batched(
                || (GraphRegistry::new(), build_linear_graph(size).build("bench", 1).expect("build should succeed")),
                |(registry, graph)| registry.register(graph).expect("register should succeed"),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_graph_compile, bench_registration);
criterion_main!(benches);
