//! Run driver: provider discovery, host bucketing, per-bucket execution.
//!
//! Three levels of parallelism: providers during discovery, buckets during
//! execution, and tasks inside each bucket's worker pool. Buckets share no
//! limiter state. Task and provider failures are caught at their dispatch
//! boundary and only show up in the counts.

mod discovery;
mod event;
mod execute;
mod summary;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::bucket::HostBuckets;
use crate::config::PublogsConfig;
use crate::limiter::LimiterConfig;
use crate::provider::Provider;
use crate::resolver::HostResolver;
use crate::task::DownloadTask;

pub use discovery::Discovery;
pub use event::{RunPhase, TaskEvent, TaskStatus};
pub use summary::{BucketReport, ProviderReport, RunSummary};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no providers selected")]
    NoProviders,
    #[error("host bucketing aborted: {0}")]
    Bucketing(#[from] tokio::task::JoinError),
}

/// Run-level knobs, from config plus command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Worker pool size per bucket; also bounds discovery parallelism.
    pub workers: usize,
    pub adaptive: bool,
    pub min_workers: usize,
    pub window: usize,
    pub up_threshold: f64,
    pub down_threshold: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&PublogsConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(cfg: &PublogsConfig) -> Self {
        Self {
            workers: cfg.workers,
            adaptive: cfg.adaptive,
            min_workers: cfg.min_workers,
            window: cfg.window,
            up_threshold: cfg.up_threshold,
            down_threshold: cfg.down_threshold,
        }
    }

    /// Fresh limiter parameters for one bucket: start at the pool size,
    /// never go below `min_workers`.
    pub fn limiter_config(&self) -> LimiterConfig {
        let max = self.workers.max(1);
        LimiterConfig::bounded(self.min_workers.clamp(1, max), max)
            .with_window(self.window)
            .with_thresholds(self.up_threshold, self.down_threshold)
    }
}

type PhaseHook = Box<dyn Fn(RunPhase<'_>) + Send + Sync>;

pub struct Orchestrator {
    options: RunOptions,
    resolver: Arc<dyn HostResolver>,
    events: Option<mpsc::Sender<TaskEvent>>,
    on_phase: Option<PhaseHook>,
}

impl Orchestrator {
    pub fn new(options: RunOptions, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            options,
            resolver,
            events: None,
            on_phase: None,
        }
    }

    /// Send one `TaskEvent` per finished task to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<TaskEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Call `hook` after discovery and after bucketing. It runs inline, so keep it short.
    pub fn with_phase_hook(mut self, hook: impl Fn(RunPhase<'_>) + Send + Sync + 'static) -> Self {
        self.on_phase = Some(Box::new(hook));
        self
    }

    fn phase(&self, phase: RunPhase<'_>) {
        if let Some(hook) = &self.on_phase {
            hook(phase);
        }
    }

    pub async fn discover(&self, providers: &[Arc<dyn Provider>], recency: Option<u32>) -> Discovery {
        discovery::discover_all(providers, recency, self.options.workers).await
    }

    /// Resolve hostnames and group tasks by server. Runs on the blocking pool
    /// since resolution may block.
    pub async fn bucket(&self, tasks: Vec<DownloadTask>) -> Result<HostBuckets, OrchestratorError> {
        let resolver = Arc::clone(&self.resolver);
        let buckets =
            tokio::task::spawn_blocking(move || HostBuckets::build(tasks, resolver.as_ref())).await?;
        tracing::info!(buckets = buckets.len(), tasks = buckets.total_tasks(), "host buckets formed");
        tracing::debug!("{}", buckets.breakdown());
        Ok(buckets)
    }

    /// Drain every bucket concurrently. Reports come back in bucket order.
    pub async fn execute(&self, buckets: HostBuckets) -> Vec<BucketReport> {
        let mut join_set = JoinSet::new();
        for (index, bucket) in buckets.into_iter().enumerate() {
            let options = self.options.clone();
            let events = self.events.clone();
            join_set.spawn(async move { (index, execute::run_bucket(bucket, options, events).await) });
        }

        let mut reports: Vec<(usize, BucketReport)> = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(done) => reports.push(done),
                Err(e) => tracing::error!(error = %e, "bucket supervisor aborted"),
            }
        }
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    /// Full run. Only an empty provider selection is an error; everything
    /// else ends in a summary.
    pub async fn run(
        &self,
        providers: &[Arc<dyn Provider>],
        recency: Option<u32>,
    ) -> Result<RunSummary, OrchestratorError> {
        if providers.is_empty() {
            return Err(OrchestratorError::NoProviders);
        }
        let discovery = self.discover(providers, recency).await;
        self.phase(RunPhase::Discovered(&discovery));
        let Discovery { reports, tasks } = discovery;

        let buckets = self.bucket(tasks).await?;
        self.phase(RunPhase::Bucketed(&buckets));
        let bucket_reports = self.execute(buckets).await;
        let summary = RunSummary::new(reports, bucket_reports);
        tracing::info!(
            discovered = summary.discovered,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests;
