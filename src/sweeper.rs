//! The background sweeper (SPEC_FULL.md §4.6): the safety net that makes
//! progress independent of whether any worker happens to be watching an
//! execution. Sweep frequency is orthogonal to correctness — ticks only
//! accelerate convergence, never gate it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rustc_hash::FxHashMap;
use tracing::{instrument, warn};

use crate::channels::errors::{ErrorEvent, LadderError};
use crate::graph::Graph;
use crate::schedulers::{ready, Dispatcher};
use crate::store::StoreGateway;
use crate::types::GraphRef;

/// Tuning the sweeper needs beyond the dispatcher's own timeout knob.
#[derive(Clone, Copy, Debug)]
pub struct SweeperTuning {
    pub interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_attempts_default: u32,
}

/// Looks up a registered graph by reference; kept as a narrow trait so
/// the sweeper does not need to depend on `graphs::registry` directly,
/// mirroring how the dispatcher only needs an `Arc<Graph>` per job.
pub trait GraphLookup: Send + Sync {
    fn lookup(&self, graph_ref: &GraphRef) -> Option<Arc<Graph>>;
}

/// Drives reclaim, schedule-firing, and readiness nudges across every
/// live execution. Construct once per engine; call [`Sweeper::tick`]
/// manually in tests, or [`Sweeper::spawn`] to run it on an interval.
pub struct Sweeper {
    store: Arc<dyn StoreGateway>,
    dispatcher: Dispatcher,
    graphs: Arc<dyn GraphLookup>,
    tuning: SweeperTuning,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        dispatcher: Dispatcher,
        graphs: Arc<dyn GraphLookup>,
        tuning: SweeperTuning,
    ) -> Self {
        Self {
            store,
            dispatcher,
            graphs,
            tuning,
        }
    }

    /// Spawn a tokio task that calls [`Sweeper::tick`] on `tuning.interval`
    /// until the returned handle is dropped or aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.tuning.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    /// One sweep pass: reclaim past-deadline attempts, then nudge
    /// readiness across every live execution (SPEC_FULL.md §4.6 steps
    /// 1–3; schedule-firing is folded into the readiness re-evaluation
    /// since a fired schedule is just a node whose `TimeAfter` predicate
    /// became satisfied).
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        if let Err(err) = self.reclaim().await {
            let event = ErrorEvent::sweep(LadderError::msg(err.to_string()));
            warn!(?event, "sweeper reclaim pass failed");
        }
        if let Err(err) = self.nudge().await {
            let event = ErrorEvent::sweep(LadderError::msg(err.to_string()));
            warn!(?event, "sweeper nudge pass failed");
        }
    }

    async fn reclaim(&self) -> crate::store::errors::Result<()> {
        let now = Utc::now();
        let stale = self.store.list_stale_computations(now).await?;
        for computation in stale {
            let outcome = crate::store::model::ComputationOutcome::Abandoned;
            // `complete_computation` keys off the claim token, but the
            // sweeper only has the row; abandoning by (execution, node)
            // degrades to a best-effort skip if the row was already
            // completed by a racing worker between list and reclaim.
            let target = computation.node_name.clone();
            if let Err(err) = self
                .store
                .complete_computation(&computation.id, &target, outcome)
                .await
            {
                warn!(computation_id = %computation.id, node = %computation.node_name, error = %err, "reclaim of stale computation failed");
            }
        }
        Ok(())
    }

    async fn nudge(&self) -> crate::store::errors::Result<()> {
        let mut cursor = None;
        loop {
            let page = self.store.list_live_executions(cursor.clone(), 100).await?;
            if page.is_empty() {
                return Ok(());
            }
            for execution in &page {
                let Some(graph) = self.graphs.lookup(&execution.graph_ref) else {
                    continue;
                };
                let snapshot = self.store.load_execution(&execution.id).await?;
                let candidates = ready(
                    &snapshot,
                    &graph,
                    Utc::now().timestamp(),
                    self.tuning.backoff_base,
                    self.tuning.backoff_cap,
                    self.tuning.max_attempts_default,
                );
                if !candidates.is_empty() {
                    self.dispatcher.enqueue(&execution.id, graph, candidates);
                }
            }
            cursor = page.last().map(|e| e.id.clone());
        }
    }
}

/// In-process graph lookup backed by a plain map, used where a full
/// `GraphRegistry` is overkill (sweeper unit tests, small embedders).
pub struct StaticGraphLookup {
    graphs: FxHashMap<GraphRef, Arc<Graph>>,
}

impl StaticGraphLookup {
    pub fn new(graphs: impl IntoIterator<Item = Arc<Graph>>) -> Self {
        Self {
            graphs: graphs.into_iter().map(|g| (g.graph_ref().clone(), g)).collect(),
        }
    }
}

impl GraphLookup for StaticGraphLookup {
    fn lookup(&self, graph_ref: &GraphRef) -> Option<Arc<Graph>> {
        self.graphs.get(graph_ref).cloned()
    }
}

impl GraphLookup for crate::graphs::GraphRegistry {
    fn lookup(&self, graph_ref: &GraphRef) -> Option<Arc<Graph>> {
        crate::graphs::GraphRegistry::lookup(self, &graph_ref.name, graph_ref.version)
    }
}
