//! Domain classification for registry hosts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

/// Upper bound for a single host lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Decides whether a path segment is a resolvable host name.
///
/// Implementations never fail: an error or timeout means "not a domain".
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn is_domain(&self, host: &str) -> bool;
}

/// Resolver backed by the host's name service.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn is_domain(&self, host: &str) -> bool {
        if !host.contains('.') {
            return false;
        }
        match tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, 0))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                tracing::debug!(host, error = %e, "Host lookup failed");
                false
            }
            Err(_) => {
                tracing::warn!(host, timeout = ?self.timeout, "Host lookup timed out");
                false
            }
        }
    }
}

/// Resolver answering from a fixed set of known hosts.
///
/// Useful where DNS is unavailable or must not be consulted.
#[derive(Debug, Default)]
pub struct StaticResolver {
    hosts: HashSet<String>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookups answered so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DomainResolver for StaticResolver {
    async fn is_domain(&self, host: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.hosts.contains(host)
    }
}
