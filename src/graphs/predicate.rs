//! The upstream-predicate language.
//!
//! A `Predicate` is a boolean expression over other nodes' presence and/or
//! values. It is evaluated by the readiness evaluator against a read-only
//! view of an execution's current node instances, and it is also the
//! source of truth for the *upstream revision vector* (§4.3) and for the
//! diagnostic decomposition used by `outstanding_computations` (§4.9).

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::types::{NodeName, UnixSeconds, Value};

/// A read-only view a predicate is evaluated against: one entry per node
/// that currently has a value, plus the revision at which it was set.
pub trait PredicateContext {
    /// The node's current value, if it has been set.
    fn value_of(&self, node: &NodeName) -> Option<&Value>;
    /// The revision at which `node`'s value was last set; `None` if unset.
    fn set_revision_of(&self, node: &NodeName) -> Option<crate::types::Revision>;
    /// Wall-clock "now" as unix seconds, for `TimeAfter`.
    fn now(&self) -> UnixSeconds;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// Always satisfied. Used for nodes with no upstream dependencies.
    Always,
    /// `provided(node)`: satisfied once `node` has a value, any value.
    Provided(NodeName),
    /// `value_equals(node, value)`: satisfied once `node`'s value equals
    /// exactly the given value.
    ValueEquals(NodeName, Value),
    /// `now() >= value(node)`, where `node`'s value is a unix-seconds
    /// integer. Used by schedule nodes to gate on a due time.
    TimeAfter(NodeName),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(parts.into_iter().collect())
    }

    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(parts.into_iter().collect())
    }

    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Evaluate the predicate against a context.
    pub fn eval(&self, ctx: &dyn PredicateContext) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Provided(node) => ctx.value_of(node).is_some(),
            Predicate::ValueEquals(node, expected) => {
                ctx.value_of(node).is_some_and(|v| v == expected)
            }
            Predicate::TimeAfter(node) => match ctx.value_of(node).and_then(Value::as_i64) {
                Some(due) => ctx.now() >= due,
                None => false,
            },
            Predicate::And(parts) => parts.iter().all(|p| p.eval(ctx)),
            Predicate::Or(parts) => parts.iter().any(|p| p.eval(ctx)),
            Predicate::Not(inner) => !inner.eval(ctx),
        }
    }

    /// The distinct set of node names this predicate reads, in first-seen
    /// order (used both for the upstream revision vector and for
    /// `outstanding_computations`'s condition decomposition — SPEC_FULL.md §9).
    pub fn referenced_nodes(&self) -> Vec<NodeName> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        self.collect_referenced(&mut seen, &mut out);
        out
    }

    fn collect_referenced(&self, seen: &mut FxHashSet<NodeName>, out: &mut Vec<NodeName>) {
        match self {
            Predicate::Always => {}
            Predicate::Provided(node) | Predicate::ValueEquals(node, _) | Predicate::TimeAfter(node) => {
                if seen.insert(node.clone()) {
                    out.push(node.clone());
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_referenced(seen, out);
                }
            }
            Predicate::Not(inner) => inner.collect_referenced(seen, out),
        }
    }

    /// Per-node, whether this predicate's direct reference to `node` is
    /// currently satisfied in isolation. Used to build the
    /// `conditions_met`/`conditions_not_met` split for diagnostics; a
    /// conjunction/disjunction is still decomposed per referenced node,
    /// not per logical clause, per SPEC_FULL.md §9's open-question
    /// resolution.
    pub fn condition_satisfied(&self, node: &NodeName, ctx: &dyn PredicateContext) -> bool {
        match self {
            Predicate::Provided(n) if n == node => ctx.value_of(node).is_some(),
            Predicate::ValueEquals(n, expected) if n == node => {
                ctx.value_of(node).is_some_and(|v| v == expected)
            }
            Predicate::TimeAfter(n) if n == node => match ctx.value_of(node).and_then(Value::as_i64) {
                Some(due) => ctx.now() >= due,
                None => false,
            },
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().any(|p| p.condition_satisfied(node, ctx)),
            Predicate::Not(inner) => inner.condition_satisfied(node, ctx),
            _ => false,
        }
    }
}
