//! Host bucketing.
//!
//! Partitions the discovered task list by target server so that concurrency
//! limits and failure statistics are kept per machine rather than globally.
//! Each distinct hostname is resolved once; every task lands in exactly one
//! bucket and bucket membership never changes once built.

mod key;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;

use crate::resolver::HostResolver;
use crate::task::DownloadTask;

pub use key::ServerKey;

/// Tasks destined for one server, in discovery order.
#[derive(Debug, Clone)]
pub struct HostBucket {
    pub key: ServerKey,
    pub hosts: BTreeSet<String>,
    pub tasks: Vec<DownloadTask>,
}

impl HostBucket {
    /// Human-readable name, e.g. `cqww.com (192.0.2.1)` or `example.org (unresolved)`.
    pub fn label(&self) -> String {
        let hosts: Vec<&str> = self.hosts.iter().map(String::as_str).collect();
        format!("{} ({})", hosts.join(", "), self.key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task counts per provider label, sorted by label.
    pub fn count_by_source(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for task in &self.tasks {
            *counts.entry(task.source().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Immutable bucket map built once before execution.
#[derive(Debug, Clone, Default)]
pub struct HostBuckets {
    buckets: BTreeMap<ServerKey, HostBucket>,
    resolved: BTreeMap<String, Option<IpAddr>>,
}

impl HostBuckets {
    /// Resolve each distinct hostname once and group the tasks by server.
    pub fn build(tasks: Vec<DownloadTask>, resolver: &dyn HostResolver) -> Self {
        let hostnames: BTreeSet<String> = tasks.iter().map(|t| t.host().to_string()).collect();
        let resolved: BTreeMap<String, Option<IpAddr>> = hostnames
            .into_iter()
            .map(|host| {
                let addr = resolver.resolve(&host);
                (host, addr)
            })
            .collect();

        let mut keys: HashMap<&str, ServerKey> = HashMap::with_capacity(resolved.len());
        for (host, addr) in &resolved {
            keys.insert(host.as_str(), ServerKey::for_host(host, *addr));
        }

        let mut buckets: BTreeMap<ServerKey, HostBucket> = BTreeMap::new();
        for task in tasks {
            let key = keys
                .get(task.host())
                .cloned()
                .unwrap_or_else(|| ServerKey::Unresolved(task.host().to_string()));
            let bucket = buckets.entry(key.clone()).or_insert_with(|| HostBucket {
                key,
                hosts: BTreeSet::new(),
                tasks: Vec::new(),
            });
            if !bucket.hosts.contains(task.host()) {
                bucket.hosts.insert(task.host().to_string());
            }
            bucket.tasks.push(task);
        }

        Self { buckets, resolved }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_tasks(&self) -> usize {
        self.buckets.values().map(HostBucket::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostBucket> {
        self.buckets.values()
    }

    pub fn breakdown(&self) -> Breakdown<'_> {
        Breakdown(self)
    }
}

impl IntoIterator for HostBuckets {
    type Item = HostBucket;
    type IntoIter = std::collections::btree_map::IntoValues<ServerKey, HostBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_values()
    }
}

/// Diagnostic listing: host -> address mapping and per-bucket counts by source.
pub struct Breakdown<'a>(&'a HostBuckets);

impl fmt::Display for Breakdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "host -> IP mapping:")?;
        for (host, addr) in &self.0.resolved {
            match addr {
                Some(ip) => writeln!(f, "  {host}: {ip}")?,
                None => writeln!(f, "  {host}: unresolved")?,
            }
        }
        writeln!(f, "bucket breakdown (server -> count by source):")?;
        for bucket in self.0.iter() {
            let sources: Vec<String> = bucket
                .count_by_source()
                .into_iter()
                .map(|(src, n)| format!("{src}:{n}"))
                .collect();
            writeln!(
                f,
                "  {}: {} tasks [{}]",
                bucket.label(),
                bucket.len(),
                sources.join(", ")
            )?;
        }
        Ok(())
    }
}
