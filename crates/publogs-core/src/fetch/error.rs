//! Fetch error type used for retry classification.

/// Error returned by a single fetch attempt (curl failure, HTTP error, or storage failure).
/// Kept separate from `anyhow` so the retry policy can classify it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// The URL could not be parsed; nothing was requested.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
