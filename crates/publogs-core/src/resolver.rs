//! Host resolution used to decide which physical server a task contends for.
//!
//! The bucketer only depends on the `HostResolver` trait. Resolution is
//! best-effort: any failure degrades to "unresolved" and is never fatal.

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

/// Placeholder host used when a URL carries no hostname.
pub const UNKNOWN_HOST: &str = "unknown";

/// Maps a hostname to the address its traffic will reach.
pub trait HostResolver: Send + Sync {
    /// `None` means unresolved.
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

fn is_resolvable(host: &str) -> bool {
    !host.is_empty() && host != UNKNOWN_HOST
}

/// Resolver backed by the operating system (`getaddrinfo`).
///
/// Blocks the calling thread; the orchestrator runs it on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        if !is_resolvable(host) {
            return None;
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        match (host, 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                let chosen = addrs
                    .iter()
                    .copied()
                    .find(IpAddr::is_ipv4)
                    .or_else(|| addrs.first().copied());
                match chosen {
                    Some(ip) => tracing::debug!(host, %ip, answers = addrs.len(), "resolved host"),
                    None => tracing::debug!(host, "resolver returned no answers"),
                }
                chosen
            }
            Err(e) => {
                tracing::debug!(host, error = %e, "host resolution failed");
                None
            }
        }
    }
}

/// Fixed hostname -> address table. Unknown hosts are unresolved.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.table.insert(host.into(), ip);
        self
    }

    /// Build from config pins; entries with unparsable addresses are skipped with a warning.
    pub fn from_pins<'a>(pins: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut table = HashMap::new();
        for (host, addr) in pins {
            match addr.parse::<IpAddr>() {
                Ok(ip) => {
                    table.insert(host.clone(), ip);
                }
                Err(_) => tracing::warn!(host = %host, addr = %addr, "ignoring invalid host pin"),
            }
        }
        Self { table }
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        self.table.get(host).copied()
    }
}

/// Consult pinned addresses first, then fall back to another resolver.
#[derive(Debug, Clone)]
pub struct PinnedResolver<R> {
    pins: StaticResolver,
    fallback: R,
}

impl<R: HostResolver> PinnedResolver<R> {
    pub fn new(pins: StaticResolver, fallback: R) -> Self {
        Self { pins, fallback }
    }
}

impl<R: HostResolver> HostResolver for PinnedResolver<R> {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        self.pins
            .resolve(host)
            .or_else(|| self.fallback.resolve(host))
    }
}
