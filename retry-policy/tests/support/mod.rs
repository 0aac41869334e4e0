//! Builders shared by the integration tests.
#![allow(dead_code)]

use retry_policy::{
    CoarseHealth, Host, HostSet, Metadata, PrioritySet, HOST_LABEL_KEY, LB_METADATA_NAMESPACE,
};
use serde_json::json;
use std::sync::Arc;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .ok();
}

pub fn mk_host(hostname: &str, addr: &str, cluster: &str) -> Arc<Host> {
    Arc::new(Host::new(hostname, addr.parse().unwrap(), cluster))
}

pub fn mk_unhealthy_host(hostname: &str, addr: &str, cluster: &str) -> Arc<Host> {
    Arc::new(
        Host::new(hostname, addr.parse().unwrap(), cluster).with_health(CoarseHealth::Unhealthy),
    )
}

pub fn mk_canary_host(hostname: &str, addr: &str, cluster: &str) -> Arc<Host> {
    Arc::new(Host::new(hostname, addr.parse().unwrap(), cluster).with_canary(true))
}

/// A host carrying the `"host"` label the attempted-label predicate screens
/// on. Dual-stack entries of one logical server share the label.
pub fn mk_labeled_host(hostname: &str, addr: &str, label: &str) -> Arc<Host> {
    Arc::new(
        Host::new(hostname, addr.parse().unwrap(), "chf-pool").with_metadata(
            Metadata::new().with_namespace(LB_METADATA_NAMESPACE, json!({ HOST_LABEL_KEY: label })),
        ),
    )
}

pub fn mk_priority_set(levels: Vec<Vec<Arc<Host>>>) -> PrioritySet {
    PrioritySet::new(levels.into_iter().map(HostSet::new).collect())
}

/// Maps a host to the priority level holding its address, the way the
/// router's priority-mapping callback does.
pub fn mapper_for(set: &PrioritySet) -> impl Fn(&Host) -> Option<usize> + '_ {
    move |host: &Host| {
        set.host_sets()
            .iter()
            .position(|level| level.hosts.iter().any(|h| h.address == host.address))
    }
}
