//! The error-ladder audit trail (`errors`) used across the engine's
//! scopes — claim, dispatch, sweep, store, engine — to record causal
//! error chains, not just a log line.

pub mod errors;
