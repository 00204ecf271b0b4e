//! Small node functions shared across the integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use loomgraph::node::{ComputeContext, FnNode, FunctionOutput, InputMap, NodeFunction, UserFunctionError};
use loomgraph::types::NodeName;

pub fn as_node<F, Fut>(f: F) -> Arc<dyn NodeFunction>
where
    F: Fn(InputMap, ComputeContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<FunctionOutput, UserFunctionError>> + Send + 'static,
{
    Arc::new(FnNode(f))
}

pub async fn double_a(inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    let n = inputs.get(&NodeName::from("a")).and_then(|v| v.as_i64()).unwrap_or(0);
    Ok(FunctionOutput::value(serde_json::json!(n * 2)))
}

pub async fn increment_b(inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    let n = inputs.get(&NodeName::from("b")).and_then(|v| v.as_i64()).unwrap_or(0);
    Ok(FunctionOutput::value(serde_json::json!(n + 1)))
}

pub async fn always_fails(_inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    Err(UserFunctionError::msg("boom"))
}

pub async fn always_panics(_inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
    panic!("node function panicked on purpose");
}

/// Fails on every attempt until `succeed_after` calls have been made, then
/// succeeds. Lets tests exercise the retry/backoff path deterministically.
pub struct FlakyNode {
    calls: AtomicU32,
    succeed_after: u32,
}

impl FlakyNode {
    pub fn new(succeed_after: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            succeed_after,
        })
    }
}

#[async_trait::async_trait]
impl NodeFunction for FlakyNode {
    async fn call(&self, _inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.succeed_after {
            Ok(FunctionOutput::value(serde_json::json!(attempt)))
        } else {
            Err(UserFunctionError::msg(format!("attempt {attempt} not ready")))
        }
    }
}

/// A schedule node whose due time is handed in at construction, always
/// firing once and then reporting `NoSchedule`.
pub struct OneShotSchedule {
    due_at: i64,
    fired: AtomicU32,
}

impl OneShotSchedule {
    pub fn new(due_at: i64) -> Arc<Self> {
        Arc::new(Self {
            due_at,
            fired: AtomicU32::new(0),
        })
    }
}

#[async_trait::async_trait]
impl NodeFunction for OneShotSchedule {
    async fn call(&self, _inputs: InputMap, _ctx: ComputeContext) -> Result<FunctionOutput, UserFunctionError> {
        if self.fired.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(FunctionOutput::ScheduleAt(self.due_at))
        } else {
            Ok(FunctionOutput::NoSchedule)
        }
    }
}
