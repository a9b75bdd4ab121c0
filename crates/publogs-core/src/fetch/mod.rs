//! HTTP fetch action.
//!
//! Uses the curl crate (libcurl) for plain GETs with a fixed User-Agent,
//! redirects followed and a per-request timeout. Downloads are idempotent:
//! an existing destination is skipped without touching the network, and a
//! new one is written through a per-attempt `.part` file so a failed transfer
//! never leaves a destination that looks complete.
//!
//! Everything here blocks the calling thread; the orchestrator runs actions
//! on tokio's blocking pool.

mod error;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::FetchError;
use tempfile::NamedTempFile;

use crate::resolver::UNKNOWN_HOST;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::storage;
use crate::task::{DownloadTask, SkipReason, TaskError, TaskOutcome};

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; public-logs-downloader/1.0)";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn easy_for(url: &str) -> Result<curl::easy::Easy, FetchError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.useragent(USER_AGENT)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(REQUEST_TIMEOUT)?;
    Ok(easy)
}

fn check_status(easy: &mut curl::easy::Easy) -> Result<(), FetchError> {
    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(())
}

/// One GET attempt, body collected in memory.
fn get_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    let mut easy = easy_for(url)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    check_status(&mut easy)?;
    Ok(body)
}

/// One GET attempt streamed into a fresh temp file beside `dest`.
fn get_into(url: &str, dest: &Path) -> Result<(NamedTempFile, u64), FetchError> {
    let mut temp = storage::create_temp(dest)?;
    let mut written = 0u64;
    let mut write_err: Option<std::io::Error> = None;
    let mut easy = easy_for(url)?;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match temp.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_err = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.perform()
    };
    if let Some(e) = write_err {
        return Err(FetchError::Storage(e));
    }
    performed?;
    check_status(&mut easy)?;
    temp.as_file().sync_all()?;
    Ok((temp, written))
}

/// Fetch a URL and return its body as text (invalid UTF-8 is replaced), with retries.
pub fn fetch_text(url: &str, policy: &RetryPolicy) -> Result<String, FetchError> {
    let bytes = run_with_retry(policy, |_| get_bytes(url))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Download `url` to `dest` unless `dest` already exists.
pub fn download_to(dest: &Path, url: &str, policy: &RetryPolicy) -> Result<TaskOutcome, FetchError> {
    if dest.exists() {
        tracing::debug!(path = %dest.display(), "skip (exists)");
        return Ok(TaskOutcome::Skipped(SkipReason::Exists));
    }
    if let Err(e) = url::Url::parse(url) {
        return Err(FetchError::InvalidUrl(format!("{url}: {e}")));
    }
    storage::ensure_parent(dest)?;
    let result = run_with_retry(policy, |attempt| {
        if attempt > 1 {
            tracing::debug!(url, attempt, "retrying download");
        }
        get_into(url, dest)
    });
    let (temp, bytes) = match result {
        Ok(done) => done,
        Err(e) => {
            tracing::warn!(url, path = %dest.display(), error = %e, "download failed");
            return Err(e);
        }
    };
    if !storage::commit(temp, dest)? {
        tracing::debug!(path = %dest.display(), "skip (written concurrently)");
        return Ok(TaskOutcome::Skipped(SkipReason::Exists));
    }
    tracing::debug!(path = %dest.display(), bytes, "downloaded");
    Ok(TaskOutcome::Written(dest.to_path_buf()))
}

/// Hostname a URL will contact, or `"unknown"` when it has none.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

/// Wrap a plain file download into a task.
pub fn http_task(
    dest: impl Into<PathBuf>,
    url: impl Into<String>,
    source: impl Into<String>,
    policy: RetryPolicy,
) -> DownloadTask {
    let dest: PathBuf = dest.into();
    let url: String = url.into();
    let host = host_of(&url);
    let target = dest.clone();
    DownloadTask::new(dest, host, source, move || {
        download_to(&target, &url, &policy).map_err(TaskError::from)
    })
}
