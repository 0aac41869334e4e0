use crate::host::Host;
use std::sync::Arc;

/// Default overprovisioning factor, in percent, applied when a level's host
/// health is translated into routable availability.
pub const DEFAULT_OVERPROVISIONING_FACTOR: u32 = 140;

/// The hosts that make up one priority level.
#[derive(Clone, Debug)]
pub struct HostSet {
    pub hosts: Vec<Arc<Host>>,
    pub overprovisioning_factor: u32,
}

/// Read-only snapshot of every priority level of the target cluster, in
/// ascending priority order. Aggregate clusters append their last-resort
/// members after the primary levels.
#[derive(Clone, Debug, Default)]
pub struct PrioritySet {
    host_sets: Vec<HostSet>,
}

// === impl HostSet ===

impl HostSet {
    pub fn new(hosts: Vec<Arc<Host>>) -> Self {
        Self {
            hosts,
            overprovisioning_factor: DEFAULT_OVERPROVISIONING_FACTOR,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// The level's terminal host. Boundary discovery compares its cluster
    /// identity against level 0's to find where the last-resort range
    /// starts.
    pub fn last_host(&self) -> Option<&Arc<Host>> {
        self.hosts.last()
    }

    /// Healthy and degraded availability of this level, in percent, after
    /// overprovisioning. Both values are capped so their sum never exceeds
    /// 100.
    pub fn availability(&self) -> (u32, u32) {
        let total = self.hosts.len() as u64;
        if total == 0 {
            return (0, 0);
        }
        let healthy = self.hosts.iter().filter(|h| h.is_healthy()).count() as u64;
        let degraded = self
            .hosts
            .iter()
            .filter(|h| h.health == crate::CoarseHealth::Degraded)
            .count() as u64;
        let factor = u64::from(self.overprovisioning_factor);
        let health = 100.min(factor * healthy / total) as u32;
        let degraded = u64::from(100 - health).min(factor * degraded / total) as u32;
        (health, degraded)
    }
}

// === impl PrioritySet ===

impl PrioritySet {
    pub fn new(host_sets: Vec<HostSet>) -> Self {
        Self { host_sets }
    }

    pub fn host_sets(&self) -> &[HostSet] {
        &self.host_sets
    }

    pub fn level(&self, priority: usize) -> Option<&HostSet> {
        self.host_sets.get(priority)
    }

    /// Number of priority levels, empty levels included.
    pub fn len(&self) -> usize {
        self.host_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host_sets.is_empty()
    }
}
