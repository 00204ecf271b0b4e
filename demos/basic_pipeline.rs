//! Walks a small dataflow graph through the engine façade end to end:
//! register a graph, start an execution, set an input, and watch the
//! revision advance as downstream nodes recompute.
//!
//! Run with: `cargo run --example basic_pipeline`

use std::sync::Arc;
use std::time::Duration;

use loomgraph::event_bus::RevisionBus;
use loomgraph::graphs::{GraphBuilder, GraphRegistry, Predicate};
use loomgraph::node::{ComputeContext, FnNode, FunctionOutput, InputMap, UserFunctionError};
use loomgraph::runtimes::{generate_mermaid_graph, summarize, Engine, EngineConfig, WaitMode};
use loomgraph::store::{InMemoryStore, StoreGateway};
use loomgraph::types::{GraphRef, NodeName};

use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,loomgraph=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(ErrorLayer::default())
        .init();
}

async fn celsius_to_fahrenheit(inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    let celsius = inputs
        .get(&NodeName::from("celsius"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| UserFunctionError::msg("celsius not a number"))?;
    Ok(FunctionOutput::value(serde_json::json!(celsius * 9.0 / 5.0 + 32.0)))
}

async fn describe_temperature(inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    let fahrenheit = inputs
        .get(&NodeName::from("fahrenheit"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| UserFunctionError::msg("fahrenheit not a number"))?;
    let description = if fahrenheit < 32.0 {
        "freezing"
    } else if fahrenheit < 70.0 {
        "cool"
    } else {
        "warm"
    };
    Ok(FunctionOutput::value(serde_json::json!(description)))
}

fn weather_graph() -> loomgraph::graph::Graph {
    GraphBuilder::new()
        .add_input("celsius")
        .add_compute(
            "fahrenheit",
            Predicate::Provided(NodeName::from("celsius")),
            Arc::new(FnNode(celsius_to_fahrenheit)),
        )
        .add_compute(
            "description",
            Predicate::Provided(NodeName::from("fahrenheit")),
            Arc::new(FnNode(describe_temperature)),
        )
        .build("weather", 1)
        .expect("graph should build")
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();
    miette::set_panic_hook();

    let graph = weather_graph();
    info!("graph:\n{}", generate_mermaid_graph(&graph));

    let registry = Arc::new(GraphRegistry::new());
    registry.register(graph)?;

    let bus = Arc::new(RevisionBus::default());
    let store: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new(Arc::clone(&bus)));
    let config = EngineConfig::default()
        .with_sweep_interval(Duration::from_millis(200))
        .with_default_attempt_timeout(Duration::from_secs(10));
    let engine = Engine::new(registry, store, bus, config);
    let _background = engine.spawn_background();

    let execution = engine.start_execution(GraphRef::new("weather", 1)).await?;
    info!("started execution {}", execution.id);

    for celsius in [0.0, 21.0, 35.0] {
        engine.set(&execution.id, &NodeName::from("celsius"), serde_json::json!(celsius)).await?;
        let outcome = engine
            .get_value(
                &execution.id,
                &NodeName::from("description"),
                WaitMode::WaitAny,
                Duration::from_secs(2),
            )
            .await?;
        info!("{celsius}C -> {outcome:?}");
    }

    let summary = summarize(engine.store().as_ref(), &execution.id).await?;
    info!("\n{summary}");

    Ok(())
}
