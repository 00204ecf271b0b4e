//! Errors surfaced by a [`super::gateway::StoreGateway`] implementation.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("execution `{execution_id}` not found")]
    #[diagnostic(
        code(loomgraph::store::unknown_execution),
        help("check the execution id came from `start_execution` and was not mistyped")
    )]
    UnknownExecution { execution_id: String },

    #[error("node `{node_name}` not found in execution `{execution_id}`")]
    #[diagnostic(code(loomgraph::store::unknown_node))]
    UnknownNode {
        execution_id: String,
        node_name: String,
    },

    #[error("execution `{execution_id}` is archived")]
    #[diagnostic(
        code(loomgraph::store::execution_archived),
        help("archived executions reject every further write_value/claim_computation/complete_computation call")
    )]
    ExecutionArchived { execution_id: String },

    /// Lost an optimistic claim race. Internal: callers never surface this
    /// to users, they skip the candidate (SPEC_FULL.md §7).
    #[error("claim conflict on execution `{execution_id}` node `{node_name}`")]
    #[diagnostic(code(loomgraph::store::conflict))]
    Conflict {
        execution_id: String,
        node_name: String,
    },

    #[error("claim token `{token}` is unknown or already completed")]
    #[diagnostic(code(loomgraph::store::unknown_claim))]
    UnknownClaim { token: String },

    #[error("backend error: {message}")]
    #[diagnostic(code(loomgraph::store::backend))]
    Backend { message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
