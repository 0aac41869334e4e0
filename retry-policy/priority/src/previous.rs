use crate::{distribute::PerPriorityState, PREVIOUS_PRIORITIES_POLICY_NAME};
use anyhow::{bail, Context, Result};
use retry_policy_core::{
    Host, PriorityLoad, PriorityMapper, PrioritySet, RetryPriority, RetryPriorityFactory,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Typed configuration of the previous-priorities policy.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PreviousPrioritiesConfig {
    /// Attempt budget per priority level, indexed by level. A level whose
    /// entry is zero never receives retries.
    pub update_frequency: Vec<u32>,
}

/// Stock retry-priority policy: a level is excluded wholesale once the
/// number of attempted hosts reaches its configured budget, and load is
/// redistributed over the levels that remain.
pub struct PreviousPriorities {
    update_frequency: Vec<u32>,
    attempted_hosts: Vec<Arc<Host>>,
    excluded_priorities: Vec<bool>,
    state: PerPriorityState,
    current_level: usize,
}

/// Builds [`PreviousPriorities`] policies.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviousPrioritiesFactory;

// === impl PreviousPriorities ===

impl PreviousPriorities {
    pub fn new(config: PreviousPrioritiesConfig, max_retries: u32) -> Self {
        Self {
            update_frequency: config.update_frequency,
            attempted_hosts: Vec::with_capacity(max_retries as usize),
            excluded_priorities: Vec::new(),
            state: PerPriorityState::default(),
            current_level: 0,
        }
    }

    fn adjust_for_attempted_priorities(&mut self, priority_set: &PrioritySet) -> bool {
        self.state.recalculate(priority_set);

        let mut availability = self.state.adjusted_availability(&self.excluded_priorities);
        if availability.total == 0 {
            // Out of priorities. Reset the exclusions once so the request
            // keeps routing instead of wedging.
            self.excluded_priorities.fill(false);
            self.attempted_hosts.clear();
            availability = self.state.adjusted_availability(&self.excluded_priorities);
        }
        if availability.total == 0 {
            return false;
        }

        self.state.distribute(&availability);
        true
    }
}

impl RetryPriority for PreviousPriorities {
    fn determine_priority_load<'a>(
        &'a mut self,
        priority_set: &PrioritySet,
        original_load: &'a PriorityLoad,
        priority_mapper: &PriorityMapper<'_>,
        _via_header_hosts: &[String],
    ) -> &'a PriorityLoad {
        let levels = priority_set.len();
        if levels == 0 || self.update_frequency.is_empty() {
            return original_load;
        }
        if self.excluded_priorities.len() != levels {
            self.excluded_priorities.resize(levels, false);
        }

        // Levels with a zero budget never receive retries.
        for (level, &frequency) in self.update_frequency.iter().enumerate() {
            if frequency == 0 {
                if let Some(excluded) = self.excluded_priorities.get_mut(level) {
                    *excluded = true;
                }
            }
        }

        // Pin the tracked level to wherever the attempted hosts currently
        // live; a membership update may have moved them.
        for host in &self.attempted_hosts {
            if let Some(level) = priority_mapper(host) {
                self.current_level = level;
            }
        }
        if self.current_level >= self.update_frequency.len() {
            self.current_level = 0;
        }
        if self.current_level >= levels {
            self.current_level = levels - 1;
        }

        // Budget for this level is used up; exclude it from here on.
        if self.attempted_hosts.len() as u32 == self.update_frequency[self.current_level] {
            self.excluded_priorities[self.current_level] = true;
        }

        if !self.excluded_priorities[self.current_level]
            && self.update_frequency[self.current_level] > 0
        {
            // The level still has budget: the previous distribution (or the
            // balancer's own, before the first redistribution) stands.
            if !self.state.load.healthy.is_empty() {
                return &self.state.load;
            }
            return original_load;
        }

        self.current_level += 1;
        for host in &self.attempted_hosts {
            if let Some(level) = priority_mapper(host) {
                if let Some(excluded) = self.excluded_priorities.get_mut(level) {
                    *excluded = true;
                }
            }
        }
        if !self.adjust_for_attempted_priorities(priority_set) {
            tracing::debug!("no availability left on any level, returning original priority load");
            return original_load;
        }

        self.attempted_hosts.clear();
        tracing::debug!(load = ?self.state.load, "returning recomputed priority load");
        &self.state.load
    }

    fn on_host_attempted(&mut self, host: &Arc<Host>) {
        self.attempted_hosts.push(host.clone());
    }

    /// This policy never vetoes a retry; budgets are enforced through the
    /// load vector alone.
    fn should_retry(&self) -> bool {
        true
    }
}

// === impl PreviousPrioritiesFactory ===

impl RetryPriorityFactory for PreviousPrioritiesFactory {
    fn name(&self) -> &'static str {
        PREVIOUS_PRIORITIES_POLICY_NAME
    }

    fn create_retry_priority(
        &self,
        config: serde_json::Value,
        max_retries: u32,
    ) -> Result<Box<dyn RetryPriority>> {
        let config: PreviousPrioritiesConfig = serde_json::from_value(config)
            .context("invalid previous-priorities retry-priority config")?;
        if config.update_frequency.is_empty() {
            bail!("update_frequency must name at least one priority level");
        }
        Ok(Box::new(PreviousPriorities::new(config, max_retries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retry_policy_core::HostSet;

    fn mk_host(name: &str, addr: &str) -> Arc<Host> {
        Arc::new(Host::new(name, addr.parse().unwrap(), "pool"))
    }

    fn mk_set(levels: Vec<Vec<Arc<Host>>>) -> PrioritySet {
        PrioritySet::new(levels.into_iter().map(HostSet::new).collect())
    }

    fn mapper_for(set: &PrioritySet) -> impl Fn(&Host) -> Option<usize> + '_ {
        move |host: &Host| {
            set.host_sets()
                .iter()
                .position(|level| level.hosts.iter().any(|h| h.address == host.address))
        }
    }

    fn mk_policy(frequency: Vec<u32>) -> PreviousPriorities {
        PreviousPriorities::new(
            PreviousPrioritiesConfig {
                update_frequency: frequency,
            },
            3,
        )
    }

    #[test]
    fn stays_on_level_until_budget_is_spent() {
        let h0 = mk_host("a.svc", "10.0.0.1:80");
        let h1 = mk_host("b.svc", "10.0.0.2:80");
        let set = mk_set(vec![
            vec![h0.clone(), h1.clone()],
            vec![mk_host("c.svc", "10.0.1.1:80")],
        ]);
        let mapper = mapper_for(&set);
        let original = PriorityLoad::from_healthy(vec![100, 0]);

        let mut policy = mk_policy(vec![2, 2]);
        policy.on_host_attempted(&h0);
        let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
        // One attempt against a budget of two: nothing changes yet.
        assert_eq!(load, &original);

        policy.on_host_attempted(&h1);
        let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
        assert_eq!(load.healthy, vec![0, 100]);
    }

    #[test]
    fn zero_frequency_levels_are_never_offered() {
        let set = mk_set(vec![
            vec![mk_host("a.svc", "10.0.0.1:80")],
            vec![mk_host("b.svc", "10.0.1.1:80")],
        ]);
        let mapper = mapper_for(&set);
        let original = PriorityLoad::from_healthy(vec![100, 0]);

        let mut policy = mk_policy(vec![0, 1]);
        let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
        assert_eq!(load.healthy, vec![0, 100]);
    }

    #[test]
    fn resets_exclusions_when_every_level_is_spent() {
        let h0 = mk_host("a.svc", "10.0.0.1:80");
        let h1 = mk_host("b.svc", "10.0.1.1:80");
        let set = mk_set(vec![vec![h0.clone()], vec![h1.clone()]]);
        let mapper = mapper_for(&set);
        let original = PriorityLoad::from_healthy(vec![100, 0]);

        let mut policy = mk_policy(vec![1, 1]);
        policy.on_host_attempted(&h0);
        let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
        assert_eq!(load.healthy, vec![0, 100]);

        policy.on_host_attempted(&h1);
        // Both levels are now spent: exclusions reset once and load covers
        // the whole view again.
        let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
        assert_eq!(load.total(), 100);
        assert!(load.healthy.iter().all(|&l| l > 0));
    }

    #[test]
    fn factory_rejects_an_empty_frequency_list() {
        let err = PreviousPrioritiesFactory
            .create_retry_priority(serde_json::json!({ "update_frequency": [] }), 3)
            .err()
            .unwrap();
        assert!(err.to_string().contains("update_frequency"));
    }
}
