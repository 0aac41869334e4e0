use retry_policy_core::{Host, PriorityMapper};
use std::{fmt, sync::Arc};

/// Hosts attempted while retries were pinned to the preferred host.
///
/// Entries are deduplicated by `Arc` identity, so the two enumeration
/// entries of a dual-stack server are tracked separately even though they
/// answer as one logical host. Once reselection starts, the tracked hosts
/// are debited against their level's eligible-host count exactly once.
#[derive(Default)]
pub(crate) struct PreferredHostTracker {
    entries: Vec<Entry>,
}

struct Entry {
    host: Arc<Host>,
    /// Already debited against its priority level's eligible-host count.
    accounted: bool,
    /// Observed unhealthy in the enumeration view after being attempted.
    unhealthy: bool,
}

// === impl PreferredHostTracker ===

impl PreferredHostTracker {
    /// Tracks `host` unless the same enumeration entry is already present.
    pub(crate) fn insert(&mut self, host: &Arc<Host>) {
        if self.entries.iter().any(|e| Arc::ptr_eq(&e.host, host)) {
            return;
        }
        self.entries.push(Entry {
            host: host.clone(),
            accounted: false,
            unhealthy: false,
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every tracked host has already been debited somewhere.
    pub(crate) fn all_accounted(&self) -> bool {
        self.entries.iter().all(|e| e.accounted)
    }

    /// Returns the tracked hosts that `mapper` places on `level`, marking
    /// each as accounted.
    pub(crate) fn hosts_in_level(
        &mut self,
        level: usize,
        mapper: &PriorityMapper<'_>,
    ) -> Vec<Arc<Host>> {
        let mut hosts = Vec::new();
        for entry in &mut self.entries {
            if mapper(&entry.host) == Some(level) {
                entry.accounted = true;
                hosts.push(entry.host.clone());
            }
        }
        hosts
    }

    pub(crate) fn mark_unhealthy(&mut self, host: &Arc<Host>) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| Arc::ptr_eq(&e.host, host))
        {
            entry.unhealthy = true;
        }
    }
}

impl fmt::Debug for PreferredHostTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("hostname", &self.host.hostname)
            .field("address", &self.host.address)
            .field("accounted", &self.accounted)
            .field("unhealthy", &self.unhealthy)
            .finish()
    }
}
