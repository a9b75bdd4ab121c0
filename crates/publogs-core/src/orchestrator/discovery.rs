//! Discovery phase: every selected provider runs on the blocking pool, at most
//! `workers` at a time. A provider that errors or panics contributes nothing.
//!
//! The flat union is keyed by destination: when several tasks target the same
//! path, the first one in selection order is kept and the rest are dropped.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::summary::ProviderReport;
use crate::provider::Provider;
use crate::task::DownloadTask;

/// Flat task list (unique destinations) plus one report per provider, both in
/// selection order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub reports: Vec<ProviderReport>,
    pub tasks: Vec<DownloadTask>,
}

impl Discovery {
    pub fn total(&self) -> usize {
        self.tasks.len()
    }
}

type Found = (ProviderReport, Vec<DownloadTask>);

pub(super) async fn discover_all(
    providers: &[Arc<dyn Provider>],
    recency: Option<u32>,
    workers: usize,
) -> Discovery {
    let limit = Arc::new(Semaphore::new(workers.max(1)));
    let mut join_set = JoinSet::new();

    for (index, provider) in providers.iter().enumerate() {
        let provider = Arc::clone(provider);
        let limit = Arc::clone(&limit);
        join_set.spawn(async move {
            let _slot = limit.acquire_owned().await;
            (index, discover_one(provider, recency).await)
        });
    }

    let mut slots: Vec<Option<Found>> = providers.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, found)) => slots[index] = Some(found),
            Err(e) => tracing::error!(error = %e, "discovery supervisor aborted"),
        }
    }

    let mut discovery = Discovery::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for (slot, provider) in slots.into_iter().zip(providers) {
        let (mut report, tasks) = slot.unwrap_or_else(|| {
            (
                ProviderReport::failed(provider.name(), "discovery aborted".to_string()),
                Vec::new(),
            )
        });
        for task in tasks {
            if claimed.insert(task.destination().to_path_buf()) {
                discovery.tasks.push(task);
            } else {
                tracing::debug!(
                    provider = %report.name,
                    destination = %task.destination().display(),
                    "duplicate destination dropped"
                );
                report.tasks -= 1;
                report.duplicates += 1;
            }
        }
        if report.duplicates > 0 {
            tracing::info!(
                provider = %report.name,
                duplicates = report.duplicates,
                "destinations already claimed by an earlier task"
            );
        }
        discovery.reports.push(report);
    }
    discovery
}

async fn discover_one(provider: Arc<dyn Provider>, recency: Option<u32>) -> Found {
    let name = provider.name().to_string();
    tracing::debug!(provider = %name, ?recency, "discovery started");
    let joined = tokio::task::spawn_blocking(move || provider.discover(recency)).await;

    let failure = |error: String| (ProviderReport::failed(&name, error), Vec::new());

    match joined {
        Ok(Ok(tasks)) => {
            tracing::info!(provider = %name, tasks = tasks.len(), "discovery finished");
            (
                ProviderReport {
                    name: name.clone(),
                    tasks: tasks.len(),
                    duplicates: 0,
                    error: None,
                },
                tasks,
            )
        }
        Ok(Err(e)) => {
            let error = format!("{e:#}");
            tracing::warn!(provider = %name, %error, "discovery failed; provider contributes no tasks");
            failure(error)
        }
        Err(e) => {
            let error = if e.is_panic() {
                "discovery panicked".to_string()
            } else {
                e.to_string()
            };
            tracing::error!(provider = %name, %error, "discovery aborted; provider contributes no tasks");
            failure(error)
        }
    }
}
