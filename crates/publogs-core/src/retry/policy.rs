use std::time::Duration;

use crate::config::RetryConfig;

/// Why a fetch attempt failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    /// 429 / 503: the server wants us to back off.
    Throttled,
    /// Refused, reset, DNS failure, truncated body.
    Connection,
    /// Any other 5xx.
    Server(u16),
    /// 4xx, local disk problems, malformed URLs. Retrying cannot help.
    Permanent,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    GiveUp,
    WaitThenRetry(Duration),
}

/// Exponential backoff for the HTTP fetch action, built from `[retry]` in config.toml.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per fetch, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base... up to `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    /// What to do after attempt number `attempt` failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            RetryDecision::GiveUp
        } else {
            RetryDecision::WaitThenRetry(self.backoff(attempt))
        }
    }
}
