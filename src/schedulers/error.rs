use miette::Diagnostic;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("node `{node}` returned a malformed result: {detail}")]
    #[diagnostic(code(loomgraph::scheduler::malformed_result))]
    MalformedResult { node: String, detail: String },

    #[error("node `{node}` panicked: {detail}")]
    #[diagnostic(code(loomgraph::scheduler::panicked))]
    Panicked { node: String, detail: String },

    #[error("graph `{graph_ref}` not found in registry")]
    #[diagnostic(code(loomgraph::scheduler::unknown_graph))]
    UnknownGraph { graph_ref: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
