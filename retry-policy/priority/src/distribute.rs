//! Per-priority availability accounting and load redistribution, the same
//! math the generic balancer applies before a policy adjusts it.

use retry_policy_core::{PriorityLoad, PrioritySet};

/// Availability bookkeeping for one policy instance plus the load vector
/// last derived from it.
///
/// `load` stays empty until the first successful [`distribute`] call, so an
/// empty vector means no adjusted distribution exists yet and the caller
/// should fall back to the balancer's original load.
///
/// [`distribute`]: PerPriorityState::distribute
#[derive(Debug, Default)]
pub(crate) struct PerPriorityState {
    pub(crate) load: PriorityLoad,
    health: Vec<u32>,
    degraded: Vec<u32>,
}

// === impl PerPriorityState ===

impl PerPriorityState {
    /// Recomputes each level's availability from the current enumeration
    /// view.
    pub(crate) fn recalculate(&mut self, priority_set: &PrioritySet) {
        let levels = priority_set.len();
        self.health.resize(levels, 0);
        self.degraded.resize(levels, 0);
        for (level, host_set) in priority_set.host_sets().iter().enumerate() {
            let (health, degraded) = host_set.availability();
            self.health[level] = health;
            self.degraded[level] = degraded;
        }
    }

    /// Availability per level with `excluded` levels zeroed, plus the total
    /// capped at 100.
    pub(crate) fn adjusted_availability(&self, excluded: &[bool]) -> AdjustedAvailability {
        let mut healthy = vec![0; self.health.len()];
        let mut degraded = vec![0; self.degraded.len()];
        let mut total = 0u32;
        for level in 0..self.health.len() {
            if excluded.get(level).copied().unwrap_or(false) {
                continue;
            }
            healthy[level] = self.health[level];
            degraded[level] = self.degraded[level];
            total += self.health[level] + self.degraded[level];
        }
        AdjustedAvailability {
            healthy,
            degraded,
            total: total.min(100),
        }
    }

    /// Distributes 100 load units proportionally to the adjusted
    /// availabilities. Earlier levels absorb the rounding remainder.
    /// `availability.total` must be non-zero.
    pub(crate) fn distribute(&mut self, availability: &AdjustedAvailability) {
        debug_assert!(availability.total > 0);
        self.load.resize(self.health.len());
        self.load.fill_zero();
        let mut unassigned: u32 = 100;
        while unassigned != 0 {
            for (level, avail) in availability.healthy.iter().enumerate() {
                let delta = unassigned.min(avail * 100 / availability.total);
                self.load.healthy[level] += delta;
                unassigned -= delta;
            }
            for (level, avail) in availability.degraded.iter().enumerate() {
                let delta = unassigned.min(avail * 100 / availability.total);
                self.load.degraded[level] += delta;
                unassigned -= delta;
            }
        }
    }
}

/// Availability per level once exclusions are applied.
#[derive(Debug)]
pub(crate) struct AdjustedAvailability {
    pub(crate) healthy: Vec<u32>,
    pub(crate) degraded: Vec<u32>,
    pub(crate) total: u32,
}
