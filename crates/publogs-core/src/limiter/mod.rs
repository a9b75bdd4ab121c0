//! Adaptive per-server concurrency limiter.
//!
//! A counting semaphore whose ceiling follows the observed failure rate:
//! - every `window` completions the failure rate is compared to two thresholds
//! - growing the ceiling hands out one extra permit immediately
//! - shrinking records one unit of debt; the next completion keeps its permit
//!   instead of returning it, so in-flight work is never interrupted
//!
//! Each host bucket owns its own instance; nothing is shared process-wide.
//!
//! The semaphore only parks waiters. Permit accounting lives in
//! `LimiterState` and every change to it happens under one lock, so
//! `snapshot()` always satisfies `available + in_flight == limit + debt`.

mod state;

use std::sync::{Mutex, MutexGuard};

use tokio::sync::{AcquireError, Semaphore};

pub use state::{
    Adjustment, LimiterConfig, LimiterSnapshot, LimiterState, Release, DEFAULT_DOWN_THRESHOLD,
    DEFAULT_UP_THRESHOLD, DEFAULT_WINDOW,
};

#[derive(Debug)]
pub struct AdaptiveLimiter {
    permits: Semaphore,
    state: Mutex<LimiterState>,
    label: String,
}

impl AdaptiveLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let state = LimiterState::new(config);
        Self {
            permits: Semaphore::new(state.limit()),
            state: Mutex::new(state),
            label: String::new(),
        }
    }

    /// Name used in adjustment logs (usually the bucket label).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until a permit is free. There is no timeout.
    pub async fn acquire(&self) -> Result<LimiterPermit<'_>, AcquireError> {
        let permit = self.permits.acquire().await?;
        let mut state = self.state();
        // Returning permits is done by hand in `record`, so the debt rule can withhold them.
        permit.forget();
        state.on_acquire();
        drop(state);
        Ok(LimiterPermit {
            limiter: self,
            released: false,
        })
    }

    /// Hand a permit back together with the outcome of the work it covered.
    pub fn release(&self, mut permit: LimiterPermit<'_>, success: bool) {
        debug_assert!(std::ptr::eq(permit.limiter, self), "permit from another limiter");
        permit.released = true;
        self.record(success);
    }

    fn record(&self, success: bool) {
        let mut state = self.state();
        let release = state.on_release(success);
        if release.permits > 0 {
            self.permits.add_permits(release.permits);
        }
        drop(state);

        if let Some(adj) = release.adjustment {
            tracing::info!(
                server = %self.label,
                from = adj.from,
                limit = adj.to,
                fail_rate = format_args!("{:.3}", adj.fail_rate),
                window = adj.window,
                "adaptive limit changed"
            );
        }
    }

    pub fn limit(&self) -> usize {
        self.state().limit()
    }

    pub fn debt(&self) -> usize {
        self.state().debt()
    }

    /// Permits currently held by running actions.
    pub fn in_flight(&self) -> usize {
        self.state().held()
    }

    /// Permits in the pool that no action holds.
    pub fn available(&self) -> usize {
        self.state().idle()
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        self.state().snapshot()
    }
}

/// Proof that one action may run. Pass it back through `AdaptiveLimiter::release`;
/// dropping it unreleased counts as a failed completion.
#[must_use = "a permit must be released with the action's outcome"]
#[derive(Debug)]
pub struct LimiterPermit<'a> {
    limiter: &'a AdaptiveLimiter,
    released: bool,
}

impl LimiterPermit<'_> {
    /// Shorthand for `limiter.release(permit, success)`.
    pub fn release(self, success: bool) {
        let limiter = self.limiter;
        limiter.release(self, success);
    }
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.limiter.record(false);
        }
    }
}
