//! Smoke tests that run the `demos/` examples end-to-end via `cargo run`.
//!
//! Disabled by default to avoid slowing down the regular test suite.
//! Enable with:
//!
//!     LOOMGRAPH_SMOKE_TESTS=1 cargo test --test smoke

use std::process::Command;

fn run_example(example_name: &str) {
    let result = Command::new("cargo")
        .args(["run", "--example", example_name])
        .output()
        .unwrap_or_else(|_| panic!("failed to run example: {example_name}"));

    assert!(
        result.status.success(),
        "example '{}' failed with exit code {:?}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
        example_name,
        result.status.code(),
        String::from_utf8_lossy(&result.stdout),
        String::from_utf8_lossy(&result.stderr)
    );

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&result.stdout),
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(!combined.trim().is_empty(), "example '{example_name}' produced no output");
}

#[test]
fn smoke_test_basic_pipeline() {
    if std::env::var("LOOMGRAPH_SMOKE_TESTS").is_err() {
        eprintln!("Skipping smoke_test_basic_pipeline (set LOOMGRAPH_SMOKE_TESTS=1 to enable)");
        return;
    }
    run_example("basic_pipeline");
}

#[test]
fn smoke_test_errors_pretty() {
    if std::env::var("LOOMGRAPH_SMOKE_TESTS").is_err() {
        eprintln!("Skipping smoke_test_errors_pretty (set LOOMGRAPH_SMOKE_TESTS=1 to enable)");
        return;
    }
    run_example("errors_pretty");
}
