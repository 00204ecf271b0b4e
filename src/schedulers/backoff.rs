//! Exponential backoff for retried computations (SPEC_FULL.md §4.4).

use std::time::Duration;

use chrono::{DateTime, Utc};

/// `delay = min(backoff_cap, backoff_base * 2^(attempt_index - 1))`.
pub fn delay_for_attempt(attempt_index: u32, backoff_base: Duration, backoff_cap: Duration) -> Duration {
    let exponent = attempt_index.saturating_sub(1).min(32);
    let scaled = backoff_base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    scaled.min(backoff_cap)
}

/// Whether a failed/abandoned attempt's backoff window has elapsed as of
/// `now`, given it completed at `completed_at`.
pub fn eligible_at(
    completed_at: DateTime<Utc>,
    attempt_index: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    now: DateTime<Utc>,
) -> bool {
    let delay = delay_for_attempt(attempt_index, backoff_base, backoff_cap);
    match chrono::Duration::from_std(delay) {
        Ok(delay) => now >= completed_at + delay,
        Err(_) => true,
    }
}
