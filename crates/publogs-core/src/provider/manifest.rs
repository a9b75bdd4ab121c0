//! Manifest-backed provider.
//!
//! A manifest is a TOML document listing downloads and, optionally, further
//! manifests to include (by relative path or http/https URL):
//!
//! ```toml
//! name = "CQWW"
//! include = ["cqww-2022.toml"]
//!
//! [[entry]]
//! url = "https://cqww.com/publiclogs/2023cw/k1abc.log"
//! dest = "CQWW/cw/2023/k1abc.log"
//! year = 2023
//! ```
//!
//! Includes are walked with the bounded expansion queue. Destinations are
//! relative to the output directory.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::expand::{expand_bounded, Expansion};
use super::{recent_years, Provider};
use crate::config::{ProviderEntry, PublogsConfig};
use crate::fetch::{self, http_task};
use crate::retry::RetryPolicy;
use crate::task::DownloadTask;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub dest: PathBuf,
    #[serde(default)]
    pub year: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default, rename = "entry")]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Location of a manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ManifestSource {
    File(PathBuf),
    Remote(url::Url),
}

impl ManifestSource {
    /// Interpret `reference` relative to the manifest that mentions it.
    fn locate(reference: &str, base: Option<&ManifestSource>) -> Result<Self> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = url::Url::parse(reference)
                .with_context(|| format!("invalid manifest URL: {reference}"))?;
            return Ok(ManifestSource::Remote(url));
        }
        match base {
            Some(ManifestSource::Remote(base_url)) => {
                let url = base_url
                    .join(reference)
                    .with_context(|| format!("invalid manifest reference: {reference}"))?;
                Ok(ManifestSource::Remote(url))
            }
            Some(ManifestSource::File(base_path)) if Path::new(reference).is_relative() => {
                let dir = base_path.parent().unwrap_or_else(|| Path::new(""));
                Ok(ManifestSource::File(dir.join(reference)))
            }
            _ => Ok(ManifestSource::File(PathBuf::from(reference))),
        }
    }

    fn load(&self, retry: &RetryPolicy) -> Result<Manifest> {
        let text = match self {
            ManifestSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("read manifest: {}", path.display()))?,
            ManifestSource::Remote(url) => fetch::fetch_text(url.as_str(), retry)
                .with_context(|| format!("fetch manifest: {url}"))?,
        };
        Manifest::parse(&text).with_context(|| format!("parse manifest: {self}"))
    }

    fn includes(&self, manifest: &Manifest) -> Vec<ManifestSource> {
        manifest
            .include
            .iter()
            .filter_map(|reference| match ManifestSource::locate(reference, Some(self)) {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(manifest = %self, reference = %reference, error = %e, "skipping include");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::File(path) => write!(f, "{}", path.display()),
            ManifestSource::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Destinations must stay inside the output directory.
fn is_safe_destination(dest: &Path) -> bool {
    !dest.as_os_str().is_empty()
        && dest
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[derive(Debug, Clone)]
pub struct ManifestProvider {
    name: String,
    root: String,
    output_dir: PathBuf,
    cap: usize,
    retry: RetryPolicy,
}

impl ManifestProvider {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            output_dir: PathBuf::from("."),
            cap: PublogsConfig::default().max_tasks_per_provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Build from a `[[providers]]` config entry, taking output dir, cap and retry from config.
    pub fn from_config(entry: &ProviderEntry, cfg: &PublogsConfig) -> Self {
        let mut provider = Self::new(entry.name.clone(), entry.manifest.clone())
            .with_cap(cfg.max_tasks_per_provider)
            .with_retry(RetryPolicy::from(&cfg.retry_or_default()));
        if let Some(dir) = &cfg.output_dir {
            provider = provider.with_output_dir(dir.clone());
        }
        provider
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Walk the root manifest and its includes; a broken root fails the provider,
    /// a broken include is skipped.
    pub fn collect_entries(&self) -> Result<Vec<ManifestEntry>> {
        let root = ManifestSource::locate(&self.root, None)?;
        let manifest = root.load(&self.retry)?;
        let mut entries = manifest.entries.clone();
        entries.truncate(self.cap);

        let seeds: Vec<ManifestSource> = root
            .includes(&manifest)
            .into_iter()
            .filter(|s| *s != root)
            .collect();
        let room = self.cap - entries.len();
        if room > 0 && !seeds.is_empty() {
            let nested = expand_bounded(&self.name, seeds, room, |source: &ManifestSource| {
                let child = source.load(&self.retry)?;
                let follow = source
                    .includes(&child)
                    .into_iter()
                    .filter(|s| *s != root)
                    .collect();
                Ok(Expansion::new(child.entries, follow))
            });
            entries.extend(nested);
        }
        Ok(entries)
    }

    fn into_tasks(&self, entries: Vec<ManifestEntry>, recency: Option<u32>) -> Vec<DownloadTask> {
        let keep_years: Option<HashSet<u16>> = recency.map(|n| {
            recent_years(entries.iter().filter_map(|e| e.year), Some(n))
                .into_iter()
                .collect()
        });

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut tasks = Vec::new();
        for entry in entries {
            if let (Some(keep), Some(year)) = (&keep_years, entry.year) {
                if !keep.contains(&year) {
                    continue;
                }
            }
            if !is_safe_destination(&entry.dest) {
                tracing::warn!(source = %self.name, dest = %entry.dest.display(), "skipping entry with unsafe destination");
                continue;
            }
            let dest = self.output_dir.join(&entry.dest);
            if !seen.insert(dest.clone()) {
                continue;
            }
            tasks.push(http_task(dest, entry.url, self.name.clone(), self.retry));
        }
        tasks
    }
}

impl Provider for ManifestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self, recency: Option<u32>) -> Result<Vec<DownloadTask>> {
        let entries = self.collect_entries()?;
        let tasks = self.into_tasks(entries, recency);
        tracing::debug!(provider = %self.name, tasks = tasks.len(), "manifest discovery finished");
        Ok(tasks)
    }
}
