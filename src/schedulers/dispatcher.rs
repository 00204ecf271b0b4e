//! The dispatcher: a bounded pool of tokio workers draining a `flume`
//! queue of ready candidates (SPEC_FULL.md §4.5).
//!
//! Workers never talk to each other directly; all coordination happens
//! through the store's `claim_computation` uniqueness constraint. A
//! worker that loses a claim race simply discards the candidate.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use rustc_hash::FxHashMap;
use tracing::{instrument, warn};

use crate::channels::errors::{ErrorEvent, LadderError};
use crate::event_bus::RevisionBus;
use crate::graph::Graph;
use crate::node::{ComputeContext, FunctionOutput, InputMap, NodeFunction};
use crate::store::errors::StoreError;
use crate::store::model::ComputationOutcome;
use crate::store::StoreGateway;
use crate::types::NodeName;

use super::readiness::{ready, ReadyCandidate};

/// One unit of work handed to a worker: which execution, which graph
/// (for function/target lookup), and the candidate readiness produced.
#[derive(Clone)]
pub struct DispatchJob {
    pub execution_id: String,
    pub graph: Arc<Graph>,
    pub candidate: ReadyCandidate,
}

/// Configuration a worker needs that does not belong on `EngineConfig`
/// itself (kept here so `readiness`/`dispatcher` stay decoupled from
/// the façade).
#[derive(Clone, Copy, Debug)]
pub struct DispatcherTuning {
    pub default_attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_attempts_default: u32,
}

/// Owns the `flume` queue and the worker tasks reading from it. Cloning
/// a `Dispatcher` clones the sender side only, so callers (the sweeper,
/// the engine façade) can enqueue without holding worker state.
#[derive(Clone)]
pub struct Dispatcher {
    sender: flume::Sender<DispatchJob>,
}

impl Dispatcher {
    /// Spawn `worker_count` tokio tasks pulling from a fresh bounded
    /// queue. Returns the dispatcher handle; dropping every clone of it
    /// closes the queue and lets workers exit.
    pub fn spawn(
        worker_count: usize,
        store: Arc<dyn StoreGateway>,
        bus: Arc<RevisionBus>,
        tuning: DispatcherTuning,
    ) -> Self {
        let (sender, receiver) = flume::unbounded::<DispatchJob>();
        let dispatcher = Self { sender };
        for worker_id in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let store = Arc::clone(&store);
            let bus = Arc::clone(&bus);
            let dispatcher = dispatcher.clone();
            tokio::spawn(worker_loop(worker_id, receiver, store, bus, dispatcher, tuning));
        }
        dispatcher
    }

    /// Enqueue a batch of candidates for `execution_id` against `graph`.
    /// Never blocks: the queue is unbounded, matching the sweeper's
    /// "nudge" step which must not stall on worker availability.
    pub fn enqueue(&self, execution_id: &str, graph: Arc<Graph>, candidates: Vec<ReadyCandidate>) {
        for candidate in candidates {
            let job = DispatchJob {
                execution_id: execution_id.to_string(),
                graph: Arc::clone(&graph),
                candidate,
            };
            if self.sender.send(job).is_err() {
                warn!("dispatcher queue closed; dropping candidate");
                return;
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: flume::Receiver<DispatchJob>,
    store: Arc<dyn StoreGateway>,
    bus: Arc<RevisionBus>,
    dispatcher: Dispatcher,
    tuning: DispatcherTuning,
) {
    while let Ok(job) = receiver.recv_async().await {
        if let Err(err) = run_job(&store, &bus, &dispatcher, &job, tuning).await {
            warn!(worker_id, execution_id = %job.execution_id, node = %job.candidate.node_name, error = %err, "dispatch job failed");
        }
    }
}

#[instrument(skip(store, bus, dispatcher, job, tuning), fields(execution_id = %job.execution_id, node = %job.candidate.node_name))]
async fn run_job(
    store: &Arc<dyn StoreGateway>,
    bus: &Arc<RevisionBus>,
    dispatcher: &Dispatcher,
    job: &DispatchJob,
    tuning: DispatcherTuning,
) -> super::error::Result<()> {
    let DispatchJob {
        execution_id,
        graph,
        candidate,
    } = job;

    let def = match graph.node(&candidate.node_name) {
        Some(def) => def,
        None => return Ok(()),
    };
    let Some(function) = def.function.as_ref() else {
        return Ok(());
    };

    let snapshot = store.load_execution(execution_id).await?;
    let timeout = def.attempt_timeout.unwrap_or(tuning.default_attempt_timeout);
    let deadline = Utc::now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::seconds(30));

    let claim = match store
        .claim_computation(
            execution_id,
            &candidate.node_name,
            deadline,
            snapshot.execution.revision,
            candidate.upstream_revisions.clone(),
        )
        .await
    {
        Ok(claim) => claim,
        Err(StoreError::Conflict { .. }) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    let inputs: InputMap = def
        .dependencies()
        .into_iter()
        .filter_map(|dep| {
            snapshot
                .node(&dep)
                .and_then(|instance| instance.value.as_value())
                .map(|v| (dep, v.clone()))
        })
        .collect();

    let ctx = ComputeContext {
        execution_id: execution_id.clone(),
        node_name: candidate.node_name.clone(),
        attempt_index: claim.attempt_index,
    };

    let outcome = invoke(function.as_ref(), inputs, ctx).await;
    let target = def.mutates.clone().unwrap_or_else(|| candidate.node_name.clone());

    let new_revision = store
        .complete_computation(&claim.token, &target, outcome)
        .await?;
    let _ = bus.publish_revision(execution_id.clone(), target.clone(), new_revision);

    // Completing a computation can satisfy downstream predicates; re-evaluate
    // readiness here so cascades make progress without waiting on the
    // sweeper's next tick.
    let snapshot_after = store.load_execution(execution_id).await?;
    let now = chrono::Utc::now().timestamp();
    let candidates = ready(
        &snapshot_after,
        graph,
        now,
        tuning.backoff_base,
        tuning.backoff_cap,
        tuning.max_attempts_default,
    );
    if !candidates.is_empty() {
        dispatcher.enqueue(execution_id, Arc::clone(graph), candidates);
    }
    Ok(())
}

/// Invoke a user function, converting panics and malformed returns into
/// the same `ComputationOutcome::Failed` shape the state machine expects
/// (SPEC_FULL.md §4.5 step 4).
async fn invoke(
    function: &dyn NodeFunction,
    inputs: InputMap,
    ctx: ComputeContext,
) -> ComputationOutcome {
    let node_name = ctx.node_name.clone();
    let attempt_index = ctx.attempt_index;
    let call = AssertUnwindSafe(function.call(inputs, ctx)).catch_unwind();
    match call.await {
        Ok(Ok(FunctionOutput::Value(value))) => ComputationOutcome::Success(value),
        Ok(Ok(FunctionOutput::ScheduleAt(unix_seconds))) => {
            ComputationOutcome::Success(serde_json::json!(unix_seconds))
        }
        Ok(Ok(FunctionOutput::NoSchedule)) => ComputationOutcome::Cancelled,
        Ok(Err(err)) => ComputationOutcome::Failed(err.to_payload()),
        Err(panic) => {
            let detail = panic_message(panic);
            let event =
                ErrorEvent::dispatch(node_name.to_string(), attempt_index, LadderError::msg(detail.clone()))
                    .with_context(serde_json::json!({ "panic": detail.clone() }));
            warn!(?event, "node function panicked");
            ComputationOutcome::Failed(serde_json::json!({ "message": detail }))
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "node function panicked with a non-string payload".to_string()
    }
}

/// Helper used by the readiness-driven callers (engine façade, sweeper)
/// to build the per-node input map outside a dispatch job, e.g. for
/// diagnostics.
pub fn input_map_for(def_deps: &[NodeName], values: &FxHashMap<NodeName, crate::types::Value>) -> InputMap {
    def_deps
        .iter()
        .filter_map(|dep| values.get(dep).map(|v| (dep.clone(), v.clone())))
        .collect()
}
