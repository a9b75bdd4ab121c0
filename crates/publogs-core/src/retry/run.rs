//! Blocking retry loop around one fetch attempt.

use super::classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::fetch::FetchError;

/// Call `attempt_fn(n)` for n = 1, 2, ... until it succeeds or the policy gives up.
/// Sleeps on the calling thread between attempts.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut attempt_fn: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        let err = match attempt_fn(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let kind = classify::classify(&err);
        let RetryDecision::WaitThenRetry(delay) = policy.decide(attempt, kind) else {
            return Err(err);
        };
        tracing::debug!(attempt, ?kind, delay_ms = delay.as_millis() as u64, error = %err, "fetch failed; backing off");
        std::thread::sleep(delay);
        attempt += 1;
    }
}
