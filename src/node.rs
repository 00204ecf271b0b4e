//! Node execution framework: the `NodeFunction` trait and the contract a
//! user function must honor.
//!
//! Nodes are pure of process state but may perform I/O (SPEC_FULL.md §3).
//! The dispatcher (`schedulers::dispatcher`) is the only caller of
//! `NodeFunction::call`.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json;
use thiserror::Error;

use crate::types::{NodeName, UnixSeconds, Value};

/// Inputs handed to a node function: one entry per node its `NodeDef`
/// declares as an upstream dependency, read at the revision recorded on
/// the claim (SPEC_FULL.md §4.5 step 3).
pub type InputMap = FxHashMap<NodeName, Value>;

/// Context passed to a node function alongside its inputs.
#[derive(Clone, Debug)]
pub struct ComputeContext {
    pub execution_id: String,
    pub node_name: NodeName,
    pub attempt_index: u32,
}

/// What a node function must return, encoding the three shapes the
/// dispatcher understands (SPEC_FULL.md §4.5 step 4).
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionOutput {
    /// A compute/mutate node produced a value.
    Value(Value),
    /// A schedule node computed a future due time, in unix seconds.
    ScheduleAt(UnixSeconds),
    /// A schedule node determined it has nothing further to schedule.
    NoSchedule,
}

impl FunctionOutput {
    pub fn value(v: impl Into<Value>) -> Self {
        FunctionOutput::Value(v.into())
    }
}

/// Error returned by a user function. Recorded verbatim as the
/// computation's `error_payload`.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct UserFunctionError {
    pub message: String,
    #[source]
    pub cause: Option<Box<UserFunctionError>>,
    pub details: Value,
}

impl UserFunctionError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "details": self.details,
        })
    }
}

/// A node's computation. Implementations should be idempotent or at
/// least tolerant of re-runs after a crash (SPEC_FULL.md §1 non-goals):
/// the engine does not guarantee exactly-once execution.
#[async_trait]
pub trait NodeFunction: Send + Sync {
    async fn call(
        &self,
        inputs: InputMap,
        ctx: ComputeContext,
    ) -> Result<FunctionOutput, UserFunctionError>;
}

/// Adapts a plain closure into a [`NodeFunction`]. Most graphs are built
/// out of these rather than hand-rolled trait impls.
pub struct FnNode<F>(pub F);

#[async_trait]
impl<F, Fut> NodeFunction for FnNode<F>
where
    F: Fn(InputMap, ComputeContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<FunctionOutput, UserFunctionError>> + Send,
{
    async fn call(
        &self,
        inputs: InputMap,
        ctx: ComputeContext,
    ) -> Result<FunctionOutput, UserFunctionError> {
        (self.0)(inputs, ctx).await
    }
}
