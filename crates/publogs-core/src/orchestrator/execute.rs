//! Execution phase for one host bucket.
//!
//! The bucket owns a fresh limiter and a worker pool of `workers` tokio tasks.
//! Each worker acquires a permit, runs the action on the blocking pool and
//! releases the permit with the outcome. Nothing here retries.
//!
//! The permit is held from before `spawn_blocking` until the action returns.
//! If tokio's blocking pool is exhausted (all buckets together running more
//! actions than `max_blocking_threads`), queued actions already count as in
//! flight for their limiter. The CLI sizes the pool for this; embedders with
//! many buckets should do the same.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::event::{TaskEvent, TaskStatus};
use super::summary::BucketReport;
use super::RunOptions;
use crate::bucket::HostBucket;
use crate::limiter::AdaptiveLimiter;
use crate::task::{DownloadTask, TaskOutcome};

struct Completed {
    destination: PathBuf,
    source: String,
    status: TaskStatus,
}

pub(super) async fn run_bucket(
    bucket: HostBucket,
    options: RunOptions,
    events: Option<mpsc::Sender<TaskEvent>>,
) -> BucketReport {
    let mut report = BucketReport::new(&bucket);
    let label = report.label.clone();
    let workers = options.workers.max(1);
    let limiter = options.adaptive.then(|| {
        Arc::new(AdaptiveLimiter::new(options.limiter_config()).with_label(label.clone()))
    });
    tracing::info!(bucket = %label, tasks = bucket.len(), workers, adaptive = options.adaptive, "bucket started");

    let mut pending = bucket.tasks.into_iter();
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < workers {
            let Some(task) = pending.next() else {
                break;
            };
            join_set.spawn(run_task(task, limiter.clone()));
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let done = match joined {
            Ok(done) => done,
            Err(e) => {
                // Workers catch action panics themselves; reaching this means the worker itself died.
                tracing::error!(bucket = %label, error = %e, "worker aborted");
                report.record(&TaskStatus::Failed(e.to_string()));
                continue;
            }
        };
        report.record(&done.status);
        if let Some(tx) = &events {
            let event = TaskEvent {
                destination: done.destination,
                source: done.source,
                bucket: label.clone(),
                status: done.status,
            };
            // A closed receiver only means nobody is listening any more.
            let _ = tx.send(event).await;
        }
    }

    report.limiter = limiter.map(|l| l.snapshot());
    tracing::info!(
        bucket = %label,
        written = report.written,
        skipped = report.skipped,
        failed = report.failed,
        "bucket drained"
    );
    report
}

async fn run_task(task: DownloadTask, limiter: Option<Arc<AdaptiveLimiter>>) -> Completed {
    let permit = match &limiter {
        Some(limiter) => match limiter.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                return Completed {
                    destination: task.destination().to_path_buf(),
                    source: task.source().to_string(),
                    status: TaskStatus::Failed(e.to_string()),
                };
            }
        },
        None => None,
    };

    let action = task.action();
    let joined = tokio::task::spawn_blocking(move || action.run()).await;

    let status = match joined {
        Ok(Ok(TaskOutcome::Written(_))) => TaskStatus::Written,
        Ok(Ok(TaskOutcome::Skipped(reason))) => TaskStatus::Skipped(reason),
        Ok(Err(e)) => {
            let error = e.to_string();
            tracing::warn!(
                destination = %task.destination().display(),
                source = %task.source(),
                host = %task.host(),
                %error,
                "task failed"
            );
            TaskStatus::Failed(error)
        }
        Err(e) => {
            let error = if e.is_panic() {
                "action panicked".to_string()
            } else {
                e.to_string()
            };
            tracing::error!(
                destination = %task.destination().display(),
                source = %task.source(),
                host = %task.host(),
                %error,
                "task aborted"
            );
            TaskStatus::Failed(error)
        }
    };

    if let Some(permit) = permit {
        permit.release(status.is_success());
    }

    Completed {
        destination: task.destination().to_path_buf(),
        source: task.source().to_string(),
        status,
    }
}
