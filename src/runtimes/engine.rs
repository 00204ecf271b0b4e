//! The engine façade (SPEC_FULL.md §4.8): wires the graph registry, the
//! store gateway, the dispatcher, the sweeper, and the revision bus
//! together behind the user-facing operations of §6, the way the
//! teacher's `AppRunner` sits in front of its scheduler and checkpointer.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::instrument;

use crate::event_bus::RevisionBus;
use crate::graph::Graph;
use crate::graphs::GraphRegistry;
use crate::schedulers::{ready, Dispatcher, DispatcherTuning, SchedulerError};
use crate::store::errors::StoreError;
use crate::store::gateway::ExecutionSnapshot;
use crate::store::model::{ComputationState, Execution};
use crate::store::StoreGateway;
use crate::sweeper::{Sweeper, SweeperTuning};
use crate::types::{GraphRef, NodeName, Revision, Value};

use super::config::EngineConfig;

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("graph `{graph_ref}` is not registered")]
    #[diagnostic(code(loomgraph::engine::unknown_graph))]
    UnknownGraph { graph_ref: GraphRef },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// How `get_value` should behave when the node is not yet `set`, or the
/// caller wants to observe a later write (SPEC_FULL.md §4.7, §6).
#[derive(Clone, Copy, Debug)]
pub enum WaitMode {
    /// Read whatever is there right now; never suspends.
    Immediate,
    /// Resolve as soon as the node's value becomes `set`.
    WaitAny,
    /// Resolve when the node's `set_revision` advances past `since`.
    WaitNew { since: Revision },
}

/// The outcome of `get_value`: a value, an explicit absence, a node whose
/// retries are permanently exhausted, or a `wait_any`/`wait_new` timing
/// out (SPEC_FULL.md §4.7 "on expiry they resolve with `timeout`"; §7
/// "all retries exhausted — `get_value` ... returns `unreachable(node,
/// last_error)`").
#[derive(Clone, Debug)]
pub enum ValueOutcome {
    Set { value: Value, set_revision: Revision },
    NotSet,
    /// The node's last attempt failed/was abandoned and `max_attempts`
    /// has been reached; no further attempt will be made against its
    /// current upstream values.
    Unreachable { last_error: Value },
    Timeout,
}

/// Ties the graph registry, store, dispatcher, sweeper, and bus together
/// behind the user-facing operations. Cheap to clone: every field is an
/// `Arc`.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<GraphRegistry>,
    store: Arc<dyn StoreGateway>,
    bus: Arc<RevisionBus>,
    dispatcher: Dispatcher,
    sweeper: Arc<Sweeper>,
    config: EngineConfig,
}

impl Engine {
    /// Wire a registry, store, and bus together under `config`. Does not
    /// start any background task; call [`Engine::spawn_background`] for
    /// that.
    ///
    /// `bus` must be the same `RevisionBus` the `store` was constructed
    /// with (e.g. `InMemoryStore::new(bus.clone())`): the store publishes
    /// revision events on it directly, and the engine's `get_value`
    /// `wait_any`/`wait_new` subscribe to it to avoid polling.
    pub fn new(
        registry: Arc<GraphRegistry>,
        store: Arc<dyn StoreGateway>,
        bus: Arc<RevisionBus>,
        config: EngineConfig,
    ) -> Self {
        let dispatcher = Dispatcher::spawn(
            config.worker_pool_size,
            Arc::clone(&store),
            Arc::clone(&bus),
            DispatcherTuning {
                default_attempt_timeout: config.default_attempt_timeout,
                backoff_base: config.backoff_base,
                backoff_cap: config.backoff_cap,
                max_attempts_default: config.max_attempts_per_node,
            },
        );
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&store),
            dispatcher.clone(),
            registry.clone() as Arc<dyn crate::sweeper::GraphLookup>,
            SweeperTuning {
                interval: config.sweep_interval,
                backoff_base: config.backoff_base,
                backoff_cap: config.backoff_cap,
                max_attempts_default: config.max_attempts_per_node,
            },
        ));
        Self {
            registry,
            store,
            bus,
            dispatcher,
            sweeper,
            config,
        }
    }

    /// Start the sweeper on its configured interval. The worker pool is
    /// already running as of [`Engine::new`]; this only starts the
    /// periodic reclaim/nudge task, mirroring the teacher's
    /// `EventBus::listen_for_events` being a separate opt-in step from
    /// bus construction.
    pub fn spawn_background(&self) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.sweeper).spawn()
    }

    fn graph(&self, graph_ref: &GraphRef) -> Result<Arc<Graph>> {
        self.registry
            .lookup(&graph_ref.name, graph_ref.version)
            .ok_or_else(|| EngineError::UnknownGraph {
                graph_ref: graph_ref.clone(),
            })
    }

    #[instrument(skip(self))]
    pub async fn start_execution(&self, graph_ref: GraphRef) -> Result<Execution> {
        let graph = self.graph(&graph_ref)?;
        let node_names: Vec<NodeName> = graph.node_names().cloned().collect();
        let execution = self.store.create_execution(graph_ref, node_names).await?;
        self.nudge(&execution.id, &graph).await?;
        Ok(execution)
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, execution_id: &str, node_name: &NodeName, value: Value) -> Result<Revision> {
        let revision = self.store.write_value(execution_id, node_name, value).await?;
        let snapshot = self.store.load_execution(execution_id).await?;
        let graph = self.graph(&snapshot.execution.graph_ref)?;
        self.nudge(execution_id, &graph).await?;
        Ok(revision)
    }

    /// Re-evaluate readiness once and enqueue any candidates. Called
    /// after every mutation so progress does not wait for the sweeper's
    /// next tick.
    async fn nudge(&self, execution_id: &str, graph: &Arc<Graph>) -> Result<()> {
        let snapshot = self.store.load_execution(execution_id).await?;
        let candidates = ready(
            &snapshot,
            graph,
            chrono::Utc::now().timestamp(),
            self.config.backoff_base,
            self.config.backoff_cap,
            self.config.max_attempts_per_node,
        );
        if !candidates.is_empty() {
            self.dispatcher.enqueue(execution_id, Arc::clone(graph), candidates);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_value(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        wait_mode: WaitMode,
        timeout: Duration,
    ) -> Result<ValueOutcome> {
        let immediate = self.read_value(execution_id, node_name).await?;
        let wait_target = match wait_mode {
            WaitMode::Immediate => return Ok(immediate),
            WaitMode::WaitAny => match immediate {
                ValueOutcome::Set { .. } | ValueOutcome::Unreachable { .. } => return Ok(immediate),
                _ => 0,
            },
            WaitMode::WaitNew { since } => {
                if matches!(immediate, ValueOutcome::Unreachable { .. }) {
                    return Ok(immediate);
                }
                since
            }
        };

        match self.bus.wait_new(execution_id, node_name, wait_target, timeout).await {
            Some(_) => self.read_value(execution_id, node_name).await,
            None => {
                // The node may have become permanently unreachable without
                // its own wait_new firing in time (e.g. the sweeper marked
                // it abandoned right at the timeout boundary); check once
                // more before giving up.
                match self.read_value(execution_id, node_name).await? {
                    unreachable @ ValueOutcome::Unreachable { .. } => Ok(unreachable),
                    _ => Ok(ValueOutcome::Timeout),
                }
            }
        }
    }

    async fn read_value(&self, execution_id: &str, node_name: &NodeName) -> Result<ValueOutcome> {
        let snapshot = self.store.load_execution(execution_id).await?;
        if let Some((value, set_revision)) = snapshot
            .node(node_name)
            .and_then(|n| n.value.as_value().map(|v| (v.clone(), n.set_revision)))
        {
            return Ok(ValueOutcome::Set { value, set_revision });
        }
        let graph = self.graph(&snapshot.execution.graph_ref)?;
        if let Some(last_error) = self.exhausted_error(&snapshot, &graph, node_name) {
            return Ok(ValueOutcome::Unreachable { last_error });
        }
        Ok(ValueOutcome::NotSet)
    }

    /// `Some(last_error)` once `node_name`'s latest attempt is terminal
    /// (failed/abandoned) and `max_attempts` (per-node override, falling
    /// back to `EngineConfig::max_attempts_per_node`) has been reached.
    fn exhausted_error(&self, snapshot: &ExecutionSnapshot, graph: &Graph, node_name: &NodeName) -> Option<Value> {
        let computation = snapshot.latest_computation(node_name)?;
        if !matches!(computation.state, ComputationState::Failed | ComputationState::Abandoned) {
            return None;
        }
        let max_attempts = graph
            .node(node_name)
            .and_then(|def| def.max_attempts)
            .unwrap_or(self.config.max_attempts_per_node);
        if computation.attempt_index < max_attempts {
            return None;
        }
        Some(computation.error_payload.clone().unwrap_or(Value::Null))
    }

    #[instrument(skip(self))]
    pub async fn values(&self, execution_id: &str) -> Result<FxHashMap<NodeName, Value>> {
        let snapshot = self.store.load_execution(execution_id).await?;
        Ok(snapshot
            .nodes
            .into_iter()
            .filter_map(|(name, instance)| instance.value.as_value().cloned().map(|v| (name, v)))
            .collect())
    }

    pub async fn load(&self, execution_id: &str) -> Result<Execution> {
        Ok(self.store.load_execution(execution_id).await?.execution)
    }

    pub async fn archive(&self, execution_id: &str) -> Result<()> {
        self.store.archive_execution(execution_id).await?;
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn StoreGateway> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<GraphRegistry> {
        &self.registry
    }
}
