//! The readiness evaluator (SPEC_FULL.md §4.3): a pure function from an
//! execution snapshot and its graph to the set of candidates the
//! dispatcher should attempt to claim. No suspension point may appear
//! anywhere in this module.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::graph::Graph;
use crate::graphs::predicate::PredicateContext;
use crate::schedulers::backoff;
use crate::store::gateway::ExecutionSnapshot;
use crate::store::model::ComputationState;
use crate::types::{NodeName, Revision, UnixSeconds, Value};

/// A node whose predicate is satisfied, has no in-flight attempt, and is
/// stale with respect to its last terminal computation.
#[derive(Clone, Debug)]
pub struct ReadyCandidate {
    pub node_name: NodeName,
    /// `set_revision` of every node the predicate reads, at evaluation
    /// time — becomes `Computation::upstream_revisions` on claim.
    pub upstream_revisions: FxHashMap<NodeName, Revision>,
}

struct SnapshotContext<'a> {
    snapshot: &'a ExecutionSnapshot,
    now: UnixSeconds,
}

impl<'a> PredicateContext for SnapshotContext<'a> {
    fn value_of(&self, node: &NodeName) -> Option<&Value> {
        self.snapshot.node(node).and_then(|n| n.value.as_value())
    }

    fn set_revision_of(&self, node: &NodeName) -> Option<Revision> {
        self.snapshot
            .node(node)
            .filter(|n| n.value.is_set())
            .map(|n| n.set_revision)
    }

    fn now(&self) -> UnixSeconds {
        self.now
    }
}

/// Evaluate readiness for every non-input node in `graph` against
/// `snapshot`. `now`/`backoff_base`/`backoff_cap` gate schedule-time
/// predicates and retry eligibility respectively. `max_attempts_default`
/// is the retry cap used for nodes without their own `NodeDef::max_attempts`
/// override.
pub fn ready(
    snapshot: &ExecutionSnapshot,
    graph: &Graph,
    now: UnixSeconds,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_attempts_default: u32,
) -> Vec<ReadyCandidate> {
    let ctx = SnapshotContext { snapshot, now };
    let mut candidates = Vec::new();

    for node in graph.nodes() {
        if node.kind.is_input() {
            continue;
        }
        if snapshot.in_flight(&node.name) {
            continue;
        }
        if !node.upstream_predicate.eval(&ctx) {
            continue;
        }

        let upstream_revisions: FxHashMap<NodeName, Revision> = node
            .dependencies()
            .into_iter()
            .map(|dep| {
                let rev = ctx.set_revision_of(&dep).unwrap_or(0);
                (dep, rev)
            })
            .collect();

        let max_attempts = node.max_attempts.unwrap_or(max_attempts_default);
        let latest = snapshot.latest_computation(&node.name);
        let stale = match latest {
            None => true,
            Some(c) => {
                let upstream_advanced = upstream_revisions
                    .iter()
                    .any(|(name, rev)| c.upstream_revisions.get(name).copied().unwrap_or(0) < *rev);
                let retryable = matches!(c.state, ComputationState::Failed | ComputationState::Abandoned)
                    && c.attempt_index < max_attempts
                    && c.completed_at
                        .is_some_and(|completed| {
                            backoff::eligible_at(
                                completed,
                                c.attempt_index,
                                backoff_base,
                                backoff_cap,
                                chrono::Utc::now(),
                            )
                        });
                upstream_advanced || retryable
            }
        };

        if stale {
            candidates.push(ReadyCandidate {
                node_name: node.name.clone(),
                upstream_revisions,
            });
        }
    }

    candidates
}

/// Per-node decomposition used by diagnostics' `outstanding_computations`
/// (SPEC_FULL.md §4.9, §9): one entry per distinct node the predicate
/// references, split by whether that reference is currently satisfied.
pub fn condition_split(
    snapshot: &ExecutionSnapshot,
    graph: &Graph,
    node_name: &NodeName,
    now: UnixSeconds,
) -> Option<(Vec<String>, Vec<String>)> {
    let def = graph.node(node_name)?;
    let ctx = SnapshotContext { snapshot, now };
    let mut met = Vec::new();
    let mut not_met = Vec::new();
    for dep in def.dependencies() {
        if def.upstream_predicate.condition_satisfied(&dep, &ctx) {
            met.push(dep.to_string());
        } else {
            not_met.push(dep.to_string());
        }
    }
    Some((met, not_met))
}
