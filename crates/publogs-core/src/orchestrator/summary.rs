//! Run results: per-provider discovery counts, per-bucket tallies and the
//! aggregate summary written by `--report`.

use serde::Serialize;

use super::event::TaskStatus;
use crate::bucket::{HostBucket, ServerKey};
use crate::limiter::LimiterSnapshot;

/// Outcome of one provider's discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub name: String,
    /// Tasks queued from this provider.
    pub tasks: usize,
    /// Tasks dropped because an earlier task already targeted the same destination.
    pub duplicates: usize,
    /// Set when discovery failed; the provider then contributed no tasks.
    pub error: Option<String>,
}

impl ProviderReport {
    pub(super) fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            tasks: 0,
            duplicates: 0,
            error: Some(error),
        }
    }
}

/// Tally for one host bucket after it drained.
#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub label: String,
    pub key: ServerKey,
    pub hosts: Vec<String>,
    pub tasks: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Final limiter state; None when adaptive limiting was off.
    pub limiter: Option<LimiterSnapshot>,
}

impl BucketReport {
    pub(super) fn new(bucket: &HostBucket) -> Self {
        Self {
            label: bucket.label(),
            key: bucket.key.clone(),
            hosts: bucket.hosts.iter().cloned().collect(),
            tasks: bucket.len(),
            written: 0,
            skipped: 0,
            failed: 0,
            limiter: None,
        }
    }

    pub(super) fn record(&mut self, status: &TaskStatus) {
        match status {
            TaskStatus::Written => self.written += 1,
            TaskStatus::Skipped(_) => self.skipped += 1,
            TaskStatus::Failed(_) => self.failed += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.written + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub providers: Vec<ProviderReport>,
    pub buckets: Vec<BucketReport>,
    pub discovered: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn new(providers: Vec<ProviderReport>, buckets: Vec<BucketReport>) -> Self {
        let discovered = providers.iter().map(|p| p.tasks).sum();
        let written = buckets.iter().map(|b| b.written).sum();
        let skipped = buckets.iter().map(|b| b.skipped).sum();
        let failed = buckets.iter().map(|b| b.failed).sum();
        Self {
            providers,
            buckets,
            discovered,
            written,
            skipped,
            failed,
        }
    }

    /// True when at least one destination was newly written. A run made only
    /// of skips and failures is the no-work condition.
    pub fn produced_output(&self) -> bool {
        self.written > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
