//! Provider contract and shared discovery helpers.
//!
//! A provider enumerates a finite list of download tasks for a recency bound.
//! It may block on network I/O; the orchestrator calls it on the blocking pool
//! and isolates its failures from other providers.

mod expand;
mod manifest;

use std::sync::Arc;

use crate::task::DownloadTask;

pub use expand::{expand_bounded, Expansion};
pub use manifest::{Manifest, ManifestEntry, ManifestProvider};

pub trait Provider: Send + Sync {
    /// Label used in reports and as the `source` of produced tasks.
    fn name(&self) -> &str;

    /// Enumerate tasks. `recency` limits the result to the N most recent years (None = all).
    fn discover(&self, recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>>;
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn discover(&self, recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
        (**self).discover(recency)
    }
}

/// The `n` most recent distinct years, newest first (`None` keeps them all).
pub fn recent_years(years: impl IntoIterator<Item = u16>, n: Option<u32>) -> Vec<u16> {
    let mut years: Vec<u16> = years.into_iter().collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    if let Some(n) = n {
        years.truncate(n as usize);
    }
    years
}
