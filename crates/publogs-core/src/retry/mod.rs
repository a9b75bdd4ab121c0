//! Retry and backoff policy for the HTTP fetch action.
//!
//! Classifies fetch failures (timeouts, throttling, connection errors) and
//! decides exponential backoff so every HTTP task shares one policy. The
//! orchestrator itself never retries; this lives inside the action.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
