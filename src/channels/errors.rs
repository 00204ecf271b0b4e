//! Error-ladder audit trail: every failed attempt, sweep pass, or store
//! write that the engine wants a permanent record of (not just a log
//! line) goes through an [`ErrorEvent`], tagged with the scope it
//! happened in and, for causal chains, a nested [`LadderError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};

/// An audited error: when it happened, in what scope, the causal chain,
/// free-form tags, and structured context.
///
/// # JSON Serialization Format
///
/// ```json
/// {
///   "when": "2025-11-02T10:30:00Z",
///   "scope": {
///     "scope": "dispatch",
///     "node": "fetch_page",
///     "attempt": 2
///   },
///   "error": {
///     "message": "upstream timed out",
///     "cause": null,
///     "details": {"timeout_ms": 5000}
///   },
///   "tags": ["retryable"],
///   "context": {"execution_id": "exec-17"}
/// }
/// ```
///
/// Supported scope variants:
/// - `"claim"`: `node` (string)
/// - `"dispatch"`: `node` (string), `attempt` (u32)
/// - `"sweep"`: no additional fields
/// - `"store"`: `operation` (string)
/// - `"engine"`: no additional fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: LadderError,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// A failed readiness claim attempt for a node.
    pub fn claim(node: impl Into<String>, error: LadderError) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Claim { node: node.into() },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// A node function returned an error on a given attempt.
    pub fn dispatch(node: impl Into<String>, attempt: u32, error: LadderError) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Dispatch {
                node: node.into(),
                attempt,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// A sweeper pass hit an error reclaiming or firing schedules.
    pub fn sweep(error: LadderError) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Sweep,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// A store-gateway operation failed.
    pub fn store(operation: impl Into<String>, error: LadderError) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Store {
                operation: operation.into(),
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// An engine-level error with no more specific scope (startup,
    /// shutdown, config).
    pub fn engine(error: LadderError) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Engine,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Claim {
        node: String,
    },
    Dispatch {
        node: String,
        attempt: u32,
    },
    Sweep,
    Store {
        operation: String,
    },
    #[default]
    Engine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LadderError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<LadderError>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for LadderError {
    fn default() -> Self {
        LadderError {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for LadderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LadderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl LadderError {
    pub fn msg(m: impl Into<String>) -> Self {
        LadderError {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: LadderError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Render error events with explicit color mode control, for log files
/// (`FormatterMode::Plain`) versus interactive terminals.
pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_errors(events);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

/// Render error events with auto-detected color support.
pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_scope_round_trips() {
        let event = ErrorEvent::dispatch("fetch", 2, LadderError::msg("timed out"))
            .with_tag("retryable");
        let json = serde_json::to_string(&event).unwrap();
        let back: ErrorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn plain_mode_has_no_ansi_codes() {
        let events = vec![ErrorEvent::sweep(LadderError::msg("reclaim failed"))];
        let plain = pretty_print_with_mode(&events, FormatterMode::Plain);
        assert!(!plain.contains("\x1b["));
    }
}
