//! Logging init: `publogs.log` under the XDG state dir, or stderr as a fallback.
//!
//! The filter defaults to `info` with debug for our own crates; `RUST_LOG`
//! overrides it.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,publogs_core=debug,publogs=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Where the log file lives (`~/.local/state/publogs/publogs.log`), creating the directory.
pub fn log_file_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("publogs")?;
    dirs.place_state_file("publogs.log")
        .context("create publogs state directory")
}

/// Install the file subscriber. Returns the log path; on error nothing is
/// installed and the caller may fall back to `init_logging_stderr`.
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file: {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {e}"))?;

    tracing::info!(path = %path.display(), "publogs logging initialized");
    Ok(path)
}

/// Install a stderr subscriber. A subscriber that is already installed wins.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
