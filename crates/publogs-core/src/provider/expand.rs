//! Bounded, provider-local expansion of discovery.
//!
//! Some sources only reveal part of their work up front: a page lists logs
//! and also links to related pages that list more. Providers walk those links
//! through a FIFO queue owned by the discovery step. Each seed is visited at
//! most once and the number of collected items is hard-capped, so the
//! orchestrator still receives one finite list.

use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

/// Result of visiting one seed: items found there and further seeds to visit.
#[derive(Debug)]
pub struct Expansion<S, T> {
    pub items: Vec<T>,
    pub follow: Vec<S>,
}

impl<S, T> Expansion<S, T> {
    pub fn new(items: Vec<T>, follow: Vec<S>) -> Self {
        Self { items, follow }
    }
}

/// Visit `seeds` breadth-first, collecting at most `cap` items.
///
/// A seed whose visit fails is logged and skipped; the rest continue.
pub fn expand_bounded<S, T, F>(
    source: &str,
    seeds: impl IntoIterator<Item = S>,
    cap: usize,
    mut visit: F,
) -> Vec<T>
where
    S: Clone + Eq + Hash + Display,
    F: FnMut(&S) -> anyhow::Result<Expansion<S, T>>,
{
    let mut pending: VecDeque<S> = VecDeque::new();
    let mut seen: HashSet<S> = HashSet::new();
    for seed in seeds {
        if seen.insert(seed.clone()) {
            pending.push_back(seed);
        }
    }

    let mut items: Vec<T> = Vec::new();
    let mut visited = 0usize;

    while let Some(seed) = pending.pop_front() {
        if items.len() >= cap {
            tracing::warn!(
                source,
                cap,
                unvisited = pending.len() + 1,
                "task cap reached; remaining pages not visited"
            );
            break;
        }
        visited += 1;
        let expansion = match visit(&seed) {
            Ok(e) => e,
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(source, seed = %seed, %error, "discovery step failed");
                continue;
            }
        };
        let room = cap - items.len();
        items.extend(expansion.items.into_iter().take(room));
        for next in expansion.follow {
            if seen.insert(next.clone()) {
                pending.push_back(next);
            }
        }
    }

    tracing::debug!(source, visited, items = items.len(), "expansion finished");
    items
}
