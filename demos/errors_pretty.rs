//! Demonstrates the error-ladder audit trail's pretty-printed output
//! across the five error scopes a running engine can emit.
//!
//! Run with: `cargo run --example errors_pretty`

use chrono::{TimeZone, Utc};
use serde_json::json;

use loomgraph::channels::errors::{pretty_print, pretty_print_with_mode, ErrorEvent, LadderError};
use loomgraph::telemetry::FormatterMode;

use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_ansi(true))
        .with(
            EnvFilter::from_default_env()
                .add_directive("loomgraph=info".parse().unwrap())
                .add_directive("errors_pretty=info".parse().unwrap()),
        )
        .with(ErrorLayer::default())
        .init();
}

fn main() {
    init_tracing();

    let claim_time = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let dispatch_time = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 5).unwrap();
    let sweep_time = Utc.with_ymd_and_hms(2026, 3, 1, 9, 1, 0).unwrap();

    let events = vec![
        {
            let mut err = ErrorEvent::claim(
                "fetch_rates",
                LadderError::msg("execution revision advanced before claim committed")
                    .with_details(json!({"ex_revision_seen": 17})),
            )
            .with_tag("retryable")
            .with_context(json!({"execution_id": "exec-9"}));
            err.when = claim_time;
            err
        },
        {
            let mut err = ErrorEvent::dispatch(
                "convert_currency",
                3,
                LadderError::msg("upstream rate service timed out").with_cause(
                    LadderError::msg("connect timeout after 5s").with_cause(LadderError::msg("connection refused")),
                ),
            )
            .with_tag("retryable")
            .with_context(json!({"attempt_deadline": "2026-03-01T09:00:35Z"}));
            err.when = dispatch_time;
            err
        },
        {
            let mut err = ErrorEvent::sweep(
                LadderError::msg("failed to reclaim stale computations").with_cause(LadderError::msg("store unavailable")),
            )
            .with_context(json!({"threshold": "2026-03-01T08:59:00Z"}));
            err.when = sweep_time;
            err
        },
    ];

    println!("=== Error ladder (auto-detect colors) ===\n{}", pretty_print(&events));
    println!(
        "\n=== Error ladder (plain, for log files) ===\n{}",
        pretty_print_with_mode(&events, FormatterMode::Plain)
    );
}
