//! Download task model.
//!
//! A task is an immutable description of one unit of work: the artifact it
//! produces (`destination`), the server it contacts (`host`), the provider
//! that discovered it (`source`) and the opaque action that does the work.
//! Providers create tasks; the orchestrator only reads them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fetch::FetchError;

/// Why an action finished without writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The destination artifact is already present.
    Exists,
    /// The source had nothing usable (e.g. a log page without QSOs).
    Empty(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Exists => write!(f, "exists"),
            SkipReason::Empty(what) => write!(f, "{what}"),
        }
    }
}

/// Successful result of running an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A new artifact was written at the given path.
    Written(PathBuf),
    /// Nothing was written; not an error.
    Skipped(SkipReason),
}

impl TaskOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, TaskOutcome::Written(_))
    }
}

/// Failure of a single action. Never escapes the task dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// The work a task performs. Implementations do their own retries,
/// idempotence checks and diagnostics; callers only see the outcome.
pub trait TaskAction: Send + Sync {
    fn run(&self) -> Result<TaskOutcome, TaskError>;
}

impl<F> TaskAction for F
where
    F: Fn() -> Result<TaskOutcome, TaskError> + Send + Sync,
{
    fn run(&self) -> Result<TaskOutcome, TaskError> {
        self()
    }
}

/// One discovered unit of work.
#[derive(Clone)]
pub struct DownloadTask {
    destination: PathBuf,
    host: String,
    source: String,
    action: Arc<dyn TaskAction>,
}

impl DownloadTask {
    pub fn new(
        destination: impl Into<PathBuf>,
        host: impl Into<String>,
        source: impl Into<String>,
        action: impl TaskAction + 'static,
    ) -> Self {
        Self {
            destination: destination.into(),
            host: host.into(),
            source: source.into(),
            action: Arc::new(action),
        }
    }

    /// Stable key of the output artifact.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Hostname contacted by the action, before resolution.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Label of the provider that produced this task.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the action, for running it off the async runtime.
    pub fn action(&self) -> Arc<dyn TaskAction> {
        Arc::clone(&self.action)
    }

    /// Run the action on the current thread.
    pub fn run(&self) -> Result<TaskOutcome, TaskError> {
        self.action.run()
    }
}

impl fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTask")
            .field("destination", &self.destination)
            .field("host", &self.host)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
