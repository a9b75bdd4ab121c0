//! Limiter accounting: windowed success/failure counts, permit ceiling and debt.
//!
//! Kept free of any synchronisation so the release algorithm can be tested
//! step by step; `AdaptiveLimiter` wraps it in a mutex.

use serde::Serialize;

/// Default number of completions per adjustment cycle.
pub const DEFAULT_WINDOW: usize = 50;
/// Default failure rate below which the limit grows.
pub const DEFAULT_UP_THRESHOLD: f64 = 0.01;
/// Default failure rate above which the limit shrinks.
pub const DEFAULT_DOWN_THRESHOLD: f64 = 0.05;

/// Limiter parameters. Bounds are normalised by `LimiterState::new`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterConfig {
    pub initial: usize,
    pub min: usize,
    pub max: usize,
    pub window: usize,
    pub up_threshold: f64,
    pub down_threshold: f64,
}

impl LimiterConfig {
    /// Start at `max` with the default window and thresholds.
    pub fn bounded(min: usize, max: usize) -> Self {
        Self {
            initial: max,
            min,
            max,
            window: DEFAULT_WINDOW,
            up_threshold: DEFAULT_UP_THRESHOLD,
            down_threshold: DEFAULT_DOWN_THRESHOLD,
        }
    }

    pub fn with_initial(mut self, initial: usize) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_thresholds(mut self, up: f64, down: f64) -> Self {
        self.up_threshold = up;
        self.down_threshold = down;
        self
    }
}

/// A change of the permit ceiling decided at the end of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub from: usize,
    pub to: usize,
    pub fail_rate: f64,
    pub window: usize,
}

/// What the caller must do after recording one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    /// Permits to hand back to the semaphore (0, 1 or 2).
    pub permits: usize,
    pub adjustment: Option<Adjustment>,
}

/// Point-in-time view of a limiter, for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterSnapshot {
    pub limit: usize,
    pub min: usize,
    pub max: usize,
    pub debt: usize,
    pub in_flight: usize,
    pub available: usize,
}

#[derive(Debug, Clone)]
pub struct LimiterState {
    limit: usize,
    min: usize,
    max: usize,
    window: usize,
    up_threshold: f64,
    down_threshold: f64,
    successes: usize,
    failures: usize,
    debt: usize,
    held: usize,
    idle: usize,
}

impl LimiterState {
    pub fn new(config: LimiterConfig) -> Self {
        let min = config.min.max(1);
        let max = config.max.max(min);
        let limit = config.initial.clamp(min, max);
        Self {
            limit,
            min,
            max,
            window: config.window.max(1),
            up_threshold: config.up_threshold,
            down_threshold: config.down_threshold,
            successes: 0,
            failures: 0,
            debt: 0,
            held: 0,
            idle: limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn debt(&self) -> usize {
        self.debt
    }

    pub fn held(&self) -> usize {
        self.held
    }

    /// Permits in the pool, not held by any action. Always
    /// `idle + held == limit + debt`.
    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            limit: self.limit,
            min: self.min,
            max: self.max,
            debt: self.debt,
            in_flight: self.held,
            available: self.idle,
        }
    }

    /// A permit left the pool and is now held by an action.
    pub fn on_acquire(&mut self) {
        self.idle = self.idle.saturating_sub(1);
        self.held += 1;
    }

    /// Record one completion and decide how many permits go back to the pool.
    pub fn on_release(&mut self, success: bool) -> Release {
        let release = self.settle(success);
        self.idle += release.permits;
        release
    }

    fn settle(&mut self, success: bool) -> Release {
        self.held = self.held.saturating_sub(1);
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }

        // Shrinking: this slot disappears instead of returning to the pool.
        if self.debt > 0 {
            self.debt -= 1;
            return Release {
                permits: 0,
                adjustment: None,
            };
        }

        let mut permits = 1;
        let total = self.successes + self.failures;
        if total < self.window {
            return Release {
                permits,
                adjustment: None,
            };
        }

        let fail_rate = self.failures as f64 / total as f64;
        let from = self.limit;
        let mut adjustment = None;
        if fail_rate > self.down_threshold && self.limit > self.min {
            self.limit -= 1;
            self.debt += 1;
            adjustment = Some(Adjustment {
                from,
                to: self.limit,
                fail_rate,
                window: total,
            });
        } else if fail_rate < self.up_threshold && self.limit < self.max {
            self.limit += 1;
            permits += 1;
            adjustment = Some(Adjustment {
                from,
                to: self.limit,
                fail_rate,
                window: total,
            });
        }

        self.successes = 0;
        self.failures = 0;
        Release {
            permits,
            adjustment,
        }
    }
}
