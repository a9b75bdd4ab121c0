//! Provider menu and the `--select` / `--last` argument forms.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use publogs_core::config::{ProviderEntry, PublogsConfig};

/// Configured providers followed by one entry per `--manifest`, in menu order.
pub fn provider_entries(cfg: &PublogsConfig, manifests: &[String]) -> Vec<ProviderEntry> {
    let mut entries = cfg.providers.clone();
    entries.extend(manifests.iter().map(|m| ProviderEntry {
        name: manifest_label(m),
        manifest: m.clone(),
    }));
    entries
}

/// Display name for an ad-hoc manifest: its file stem, upper-cased.
pub fn manifest_label(manifest: &str) -> String {
    let last = manifest
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(manifest);
    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last);
    if stem.is_empty() {
        manifest.to_string()
    } else {
        stem.to_uppercase()
    }
}

/// Pick providers by 1-based menu numbers: "1,3", "2-4", "all" or none (= all).
/// The result keeps menu order whatever order the numbers were given in.
pub fn select_providers(entries: &[ProviderEntry], selection: Option<&str>) -> Result<Vec<ProviderEntry>> {
    let selection = match selection.map(str::trim) {
        None | Some("") => return Ok(entries.to_vec()),
        Some(s) if s.eq_ignore_ascii_case("all") => return Ok(entries.to_vec()),
        Some(s) => s,
    };

    let mut picked = BTreeSet::new();
    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a)?, parse_index(b)?),
            None => {
                let n = parse_index(part)?;
                (n, n)
            }
        };
        if lo > hi {
            bail!("invalid provider range: {part}");
        }
        for n in lo..=hi {
            if n > entries.len() {
                bail!("no provider numbered {n} (have {})", entries.len());
            }
            picked.insert(n - 1);
        }
    }
    Ok(picked.into_iter().map(|i| entries[i].clone()).collect())
}

fn parse_index(s: &str) -> Result<usize> {
    let n: usize = s
        .trim()
        .parse()
        .with_context(|| format!("invalid provider number: {s:?}"))?;
    if n == 0 {
        bail!("provider numbers start at 1");
    }
    Ok(n)
}

/// `--last N` or `--last all`; absent means all years.
pub fn parse_recency(last: Option<&str>) -> Result<Option<u32>> {
    match last.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => {
            let n: u32 = s
                .parse()
                .with_context(|| format!("--last expects a number or \"all\", got {s:?}"))?;
            if n == 0 {
                bail!("--last must be at least 1");
            }
            Ok(Some(n))
        }
    }
}
