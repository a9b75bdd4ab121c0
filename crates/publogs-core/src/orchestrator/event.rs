use std::fmt;
use std::path::PathBuf;

use super::discovery::Discovery;
use crate::bucket::HostBuckets;
use crate::task::SkipReason;

/// Run progress handed to the phase hook as `Orchestrator::run` moves on.
#[derive(Debug, Clone, Copy)]
pub enum RunPhase<'a> {
    /// Every provider has finished; the task list is deduplicated.
    Discovered(&'a Discovery),
    /// Buckets are formed and execution is about to start.
    Bucketed(&'a HostBuckets),
}

/// How one task finished, as seen at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Written,
    Skipped(SkipReason),
    Failed(String),
}

impl TaskStatus {
    /// What the limiter is told: anything but a failure counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, TaskStatus::Failed(_))
    }
}

/// Per-task progress notification for front ends.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub destination: PathBuf,
    pub source: String,
    pub bucket: String,
    pub status: TaskStatus,
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dest = self.destination.display();
        match &self.status {
            TaskStatus::Written => write!(f, "ok   {dest}"),
            TaskStatus::Skipped(reason) => write!(f, "skip ({reason}): {dest}"),
            TaskStatus::Failed(error) => write!(f, "fail {dest} [{}]: {error}", self.source),
        }
    }
}
