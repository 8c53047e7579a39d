// crates/pedant-harness/src/retry.rs
// ============================================================================
// Module: Pedant Retry Helper
// Description: Bounded polling for eventually consistent server state.
// Purpose: Let scenarios wait for search indexing without arbitrary sleeps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`retry_until`] calls an attempt closure until it reports
//! [`Attempt::Done`] or the policy's time budget runs out, then returns the
//! last value produced. Only scenario steps use it; the transport never
//! retries on its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Time budget and pacing for [`retry_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time allowed across attempts.
    pub timeout: Duration,
    /// Pause between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
        }
    }

    /// Policy for search polling bounded by `maximum_search_time`.
    #[must_use]
    pub const fn for_search(maximum_search_time: Duration) -> Self {
        Self::new(maximum_search_time, DEFAULT_RETRY_INTERVAL)
    }
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Stop and return the value.
    Done(T),
    /// Try again if time remains; the value is returned if it does not.
    Retry(T),
}

/// Runs `attempt` (with a 1-based attempt number) until it is done or the
/// budget is spent. Always runs at least once.
pub fn retry_until<T>(policy: &RetryPolicy, mut attempt: impl FnMut(u32) -> Attempt<T>) -> T {
    let started = Instant::now();
    let mut count = 0u32;
    loop {
        count = count.saturating_add(1);
        match attempt(count) {
            Attempt::Done(value) => return value,
            Attempt::Retry(value) => {
                if started.elapsed().saturating_add(policy.interval) > policy.timeout {
                    return value;
                }
                thread::sleep(policy.interval);
            }
        }
    }
}
