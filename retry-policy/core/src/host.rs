use crate::metadata::Metadata;
use std::{fmt, net::SocketAddr, sync::Arc};

/// Coarse health of an upstream endpoint, as published by the host
/// environment's health checking and outlier detection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoarseHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Identifies the cluster an endpoint was discovered through.
///
/// Aggregate clusters splice several member clusters into one priority
/// range, so two hosts with equal `ClusterId`s belong to the same member
/// pool even when their `Arc`s differ. Comparison is by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(Arc<str>);

/// One upstream endpoint in the enumeration view handed to retry plugins.
///
/// A `Host` is immutable for the lifetime of the view that contains it.
/// Plugins track attempted hosts by `Arc` identity (`Arc::ptr_eq`), never by
/// value: in dual-stack deployments one logical server surfaces as two
/// entries that share a hostname but differ in address.
#[derive(Clone, Debug)]
pub struct Host {
    pub hostname: String,
    pub address: SocketAddr,
    pub cluster: ClusterId,
    pub health: CoarseHealth,
    pub canary: bool,
    pub metadata: Metadata,
}

// === impl CoarseHealth ===

impl CoarseHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

// === impl ClusterId ===

impl ClusterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterId {
    fn from(name: &str) -> Self {
        Self(name.into())
    }
}

impl From<String> for ClusterId {
    fn from(name: String) -> Self {
        Self(name.into())
    }
}

impl From<Arc<str>> for ClusterId {
    fn from(name: Arc<str>) -> Self {
        Self(name)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl Host ===

impl Host {
    pub fn new(
        hostname: impl Into<String>,
        address: SocketAddr,
        cluster: impl Into<ClusterId>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address,
            cluster: cluster.into(),
            health: CoarseHealth::Healthy,
            canary: false,
            metadata: Metadata::default(),
        }
    }

    pub fn with_health(mut self, health: CoarseHealth) -> Self {
        self.health = health;
        self
    }

    pub fn with_canary(mut self, canary: bool) -> Self {
        self.canary = canary;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// Whether a single via-header entry names this host, either by FQDN or
    /// by `ip:port` endpoint address.
    pub fn matches_via_entry(&self, entry: &str) -> bool {
        self.hostname == entry || self.address.to_string() == entry
    }

    /// Whether any entry of a parsed via header names this host.
    pub fn in_via_list(&self, via_header_hosts: &[String]) -> bool {
        via_header_hosts
            .iter()
            .any(|entry| self.matches_via_entry(entry))
    }
}
