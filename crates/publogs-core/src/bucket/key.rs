use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// Identity of the physical server a bucket's tasks contend for.
///
/// Resolved hostnames are keyed by address, so distinct names pointing at the
/// same machine share one bucket. Unresolved hostnames keep their own name and
/// stay isolated from each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ServerKey {
    Address(IpAddr),
    Unresolved(String),
}

impl ServerKey {
    pub fn for_host(host: &str, address: Option<IpAddr>) -> Self {
        match address {
            Some(ip) => ServerKey::Address(ip),
            None => ServerKey::Unresolved(host.to_string()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ServerKey::Address(_))
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKey::Address(ip) => write!(f, "{ip}"),
            ServerKey::Unresolved(_) => write!(f, "unresolved"),
        }
    }
}
