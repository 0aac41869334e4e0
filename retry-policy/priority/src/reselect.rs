use crate::{
    distribute::PerPriorityState, metrics::ReselectMetrics, tracker::PreferredHostTracker,
    RESELECT_POLICY_NAME,
};
use anyhow::{Context, Result};
use retry_policy_core::{
    Host, PriorityLoad, PriorityMapper, PrioritySet, RetryPriority, RetryPriorityFactory,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Typed configuration of the reselection policy. All budgets default to
/// zero and a phase whose budget is zero is skipped outright.
#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReselectConfig {
    /// Retries aimed back at the request's first host before any
    /// reselection happens.
    pub preferred_host_retries: u32,

    /// Reselections within the primary priority range.
    pub failover_reselects: u32,

    /// Reselections within an aggregate cluster's last-resort range.
    pub last_resort_reselects: u32,

    /// Count only `Healthy` hosts as eligible, so hosts parked by outlier
    /// detection stop holding priority levels open.
    pub support_temporary_blocking: bool,

    /// Count hosts named by the request's via header as ineligible.
    pub support_loop_prevention: bool,
}

/// Boundary between the primary priority range and an aggregate cluster's
/// last-resort range, discovered by comparing each level's terminal host
/// cluster against level 0's.
#[derive(Debug)]
struct PriorityRange {
    /// Last priority level still served by the primary cluster.
    last_primary: usize,
    /// First level of the last-resort pool, once discovered.
    last_resort_start: Option<usize>,
    /// Set once the jump into the last-resort range has happened; the jump
    /// is one-way.
    adjusted_for_last_resort: bool,
}

/// Phased retry-priority policy.
///
/// A request's retries walk through up to three phases, each governed by
/// its own budget: repeats against the preferred host, reselects across the
/// primary priority range, and reselects across the last-resort range of an
/// aggregate cluster. Budgets only ever shrink, so the walk never revisits
/// an earlier phase.
pub struct ReselectRetryPriority {
    preferred_host_retries: u32,
    failover_reselects: u32,
    last_resort_reselects: u32,
    support_temporary_blocking: bool,
    support_loop_prevention: bool,

    invoked_once: bool,
    current_level: usize,
    remaining_in_current_level: u32,
    /// One level of lookahead so `should_retry` can answer without another
    /// enumeration pass.
    next_level: Option<usize>,
    remaining_in_next_level: u32,

    excluded_priorities: Vec<bool>,
    state: PerPriorityState,
    range: PriorityRange,
    attempted: PreferredHostTracker,
    via_header_hosts: Vec<String>,
    metrics: ReselectMetrics,
}

/// Builds [`ReselectRetryPriority`] policies and hands each one the shared
/// decision counters.
#[derive(Clone, Debug, Default)]
pub struct ReselectFactory {
    metrics: ReselectMetrics,
}

// === impl PriorityRange ===

impl PriorityRange {
    fn new(levels: usize) -> Self {
        Self {
            last_primary: levels.saturating_sub(1),
            last_resort_start: None,
            adjusted_for_last_resort: false,
        }
    }
}

// === impl ReselectRetryPriority ===

impl ReselectRetryPriority {
    pub fn new(config: ReselectConfig) -> Self {
        Self::with_metrics(config, ReselectMetrics::default())
    }

    pub fn with_metrics(config: ReselectConfig, metrics: ReselectMetrics) -> Self {
        Self {
            preferred_host_retries: config.preferred_host_retries,
            failover_reselects: config.failover_reselects,
            last_resort_reselects: config.last_resort_reselects,
            support_temporary_blocking: config.support_temporary_blocking,
            support_loop_prevention: config.support_loop_prevention,
            invoked_once: false,
            current_level: 0,
            remaining_in_current_level: 0,
            next_level: None,
            remaining_in_next_level: 0,
            excluded_priorities: Vec::new(),
            state: PerPriorityState::default(),
            range: PriorityRange::new(0),
            attempted: PreferredHostTracker::default(),
            via_header_hosts: Vec::new(),
            metrics,
        }
    }

    pub fn preferred_host_retries(&self) -> u32 {
        self.preferred_host_retries
    }

    pub fn failover_reselects(&self) -> u32 {
        self.failover_reselects
    }

    pub fn last_resort_reselects(&self) -> u32 {
        self.last_resort_reselects
    }

    /// Whether the next reselection must land in the last-resort range:
    /// failover budget is spent, last-resort budget is not, and the jump
    /// has not happened yet. Never true before the first load decision so
    /// a zero failover budget cannot divert the initial selection.
    fn should_skip_to_last_resort(&self) -> bool {
        if !self.invoked_once {
            return false;
        }
        self.preferred_host_retries == 0
            && !self.range.adjusted_for_last_resort
            && self.last_resort_reselects > 0
            && self.failover_reselects == 0
    }

    /// Whether the budget governing `level` still allows a reselection
    /// there. Before the last-resort boundary is discovered, any remaining
    /// budget counts: configuration promising last-resort reselects implies
    /// such a pool exists.
    fn reselects_remaining_for(&self, level: usize) -> bool {
        match self.range.last_resort_start {
            Some(start) if level >= start => self.last_resort_reselects > 0,
            Some(_) => self.failover_reselects > 0,
            None => self.failover_reselects > 0 || self.last_resort_reselects > 0,
        }
    }

    /// Advances `current_level` to the next level with eligible hosts and
    /// refreshes the one-level lookahead. A pending last-resort jump
    /// invalidates the cached lookahead.
    fn determine_next_priority(
        &mut self,
        priority_set: &PrioritySet,
        priority_mapper: &PriorityMapper<'_>,
        skip_to_last_resort: bool,
    ) {
        match (self.next_level.take(), skip_to_last_resort) {
            (Some(next), false) => {
                self.remaining_in_current_level = self.remaining_in_next_level;
                self.current_level = next;
            }
            _ => {
                let start = if self.invoked_once {
                    self.current_level + 1
                } else {
                    // The first decision still has to vet the starting
                    // level itself.
                    self.current_level
                };
                let (level, remaining) = self.find_next_priority(
                    priority_set,
                    priority_mapper,
                    start,
                    skip_to_last_resort,
                );
                self.current_level = level;
                self.remaining_in_current_level = remaining;
            }
        }

        // Everything below the level we advanced to is spent.
        let spent = self.current_level.min(self.excluded_priorities.len());
        for excluded in &mut self.excluded_priorities[..spent] {
            *excluded = true;
        }

        let (next, remaining) = self.find_next_priority(
            priority_set,
            priority_mapper,
            self.current_level + 1,
            false,
        );
        self.next_level = Some(next);
        self.remaining_in_next_level = remaining;
    }

    /// Scans for the next priority level with eligible hosts, starting at
    /// `start_index`, and returns it with its eligible-host count. When
    /// `skip_to_last_resort` is set the scan is pinned to the last-resort
    /// range instead of the given start. Along the way the scan learns
    /// where the last-resort range begins.
    fn find_next_priority(
        &mut self,
        priority_set: &PrioritySet,
        priority_mapper: &PriorityMapper<'_>,
        start_index: usize,
        skip_to_last_resort: bool,
    ) -> (usize, u32) {
        let mut index = start_index;
        let mut remaining = 0u32;

        // A membership update can briefly publish a view without hosts on
        // level 0. Cluster-boundary discovery is meaningless then; leave
        // the scan empty-handed instead of chasing it.
        let primary_cluster = priority_set
            .level(0)
            .and_then(|set| set.last_host())
            .map(|host| host.cluster.clone());

        if let Some(primary_cluster) = primary_cluster {
            if skip_to_last_resort {
                index = self
                    .range
                    .last_resort_start
                    .unwrap_or(self.current_level);
            }

            while remaining == 0 && index < priority_set.len() {
                let host_set = &priority_set.host_sets()[index];
                if host_set.is_empty() {
                    // An endpoint update can leave a level without hosts
                    // yet keep it in the view. Skip it, remembering it as a
                    // candidate end of the primary range.
                    self.range.last_primary = index;
                    index += 1;
                    continue;
                }

                if self.range.last_resort_start.is_none() {
                    let crosses_cluster = host_set
                        .last_host()
                        .map_or(false, |host| host.cluster != primary_cluster);
                    if crosses_cluster {
                        // First level of the last-resort pool. The last
                        // non-empty level before it ends the primary range.
                        if let Some(last) = (0..index)
                            .rev()
                            .find(|&i| !priority_set.host_sets()[i].is_empty())
                        {
                            self.range.last_primary = last;
                        }
                        self.range.last_resort_start = Some(index);
                        tracing::debug!(
                            last_primary = self.range.last_primary,
                            last_resort_start = index,
                            "discovered last-resort boundary"
                        );
                    } else if skip_to_last_resort {
                        index += 1;
                        continue;
                    }
                }

                let eligible = self.count_hosts_on_level(&host_set.hosts);
                let tried = self.already_tried_on_level(priority_set, priority_mapper, index);
                remaining = eligible.saturating_sub(tried);
                tracing::debug!(level = index, eligible = remaining, "eligible hosts on level");
                if remaining == 0 {
                    index += 1;
                }
            }
        }

        if skip_to_last_resort
            && self
                .range
                .last_resort_start
                .map_or(false, |start| index >= start)
        {
            // The jump landed; whatever failover budget is left can never
            // be used again.
            self.failover_reselects = 0;
            self.range.adjusted_for_last_resort = true;
            self.metrics.last_resort_jumps.inc();
        }

        (index, remaining)
    }

    /// Counts the hosts of one level that a reselection may still pick.
    fn count_hosts_on_level(&self, hosts: &[Arc<Host>]) -> u32 {
        let eligible = match (self.support_temporary_blocking, self.support_loop_prevention) {
            (true, true) => hosts
                .iter()
                .filter(|host| {
                    // A host named by the via header only counts while
                    // healthy; all others count unconditionally.
                    if host.in_via_list(&self.via_header_hosts) {
                        host.is_healthy()
                    } else {
                        true
                    }
                })
                .count(),
            (true, false) => hosts.iter().filter(|host| host.is_healthy()).count(),
            (false, true) => hosts
                .iter()
                .filter(|host| !host.in_via_list(&self.via_header_hosts))
                .count(),
            (false, false) => hosts.len(),
        };
        eligible as u32
    }

    /// How many already-attempted hosts currently occupy `level`. With
    /// temporary blocking, an attempted host that outlier detection has
    /// since taken out of `Healthy` no longer holds one of the level's
    /// eligible slots, so it is not debited.
    fn already_tried_on_level(
        &mut self,
        priority_set: &PrioritySet,
        priority_mapper: &PriorityMapper<'_>,
        level: usize,
    ) -> u32 {
        if self.attempted.is_empty() || self.attempted.all_accounted() {
            return 0;
        }

        let tried = self.attempted.hosts_in_level(level, priority_mapper);
        let mut count = tried.len() as u32;
        if self.support_temporary_blocking {
            if let Some(host_set) = priority_set.level(level) {
                for tried_host in &tried {
                    let now_unhealthy = host_set.hosts.iter().any(|host| {
                        !host.is_healthy() && host.address == tried_host.address
                    });
                    if now_unhealthy {
                        tracing::debug!(
                            hostname = %tried_host.hostname,
                            address = %tried_host.address,
                            level,
                            "attempted host no longer healthy"
                        );
                        self.attempted.mark_unhealthy(tried_host);
                        count = count.saturating_sub(1);
                    }
                }
            }
        }
        count
    }

    /// Rebuilds the load vector over the non-excluded levels. When every
    /// level is excluded, exclusions are reset once and the distribution is
    /// retried over the full view; `false` means no availability exists at
    /// all and the caller falls back to the original load.
    fn adjust_for_attempted_priorities(&mut self, priority_set: &PrioritySet) -> bool {
        self.state.recalculate(priority_set);

        let mut availability = self.state.adjusted_availability(&self.excluded_priorities);
        if availability.total == 0 {
            self.excluded_priorities.fill(false);
            availability = self.state.adjusted_availability(&self.excluded_priorities);
        }
        if availability.total == 0 {
            return false;
        }

        self.state.distribute(&availability);
        true
    }
}

impl RetryPriority for ReselectRetryPriority {
    fn determine_priority_load<'a>(
        &'a mut self,
        priority_set: &PrioritySet,
        original_load: &'a PriorityLoad,
        priority_mapper: &PriorityMapper<'_>,
        via_header_hosts: &[String],
    ) -> &'a PriorityLoad {
        if !self.invoked_once {
            // First reselect decision: size the exclusion flags, fix the
            // priority range, and pick the starting level from the load the
            // balancer would have used.
            self.excluded_priorities.resize(priority_set.len(), false);
            self.range = PriorityRange::new(priority_set.len());

            match original_load.first_healthy_level() {
                Some(level) => {
                    self.current_level = level;
                    tracing::debug!(level, "starting priority level");
                }
                None => {
                    // The whole cluster is out; there is nothing to steer.
                    tracing::debug!(
                        load = ?original_load,
                        "original priority load is all zeros, returning it unmodified"
                    );
                    self.invoked_once = true;
                    return original_load;
                }
            }

            if priority_set.level(0).map_or(true, |set| set.is_empty()) {
                tracing::debug!("no hosts on priority level 0, returning original priority load");
                self.invoked_once = true;
                return original_load;
            }

            if self.support_loop_prevention {
                if via_header_hosts.is_empty() {
                    // Loop prevention is configured but this request brought
                    // no via entries; counting against an empty list would
                    // only cost time.
                    self.support_loop_prevention = false;
                } else {
                    self.via_header_hosts = via_header_hosts.to_vec();
                }
            }
        }

        let skip_to_last_resort = self.should_skip_to_last_resort();
        if self.remaining_in_current_level > 0 && !skip_to_last_resort {
            // The current level still has eligible hosts; the previously
            // computed distribution stands. The first decision never takes
            // this path since the remaining count starts at zero.
            tracing::debug!(load = ?self.state.load, "returning cached priority load");
            if self.state.load.healthy.is_empty() {
                return original_load;
            }
            return &self.state.load;
        }

        if self.invoked_once {
            tracing::debug!(
                level = self.current_level,
                attempted = ?self.attempted,
                "tried all eligible hosts on current level"
            );
        }
        if self.excluded_priorities.len() < priority_set.len() {
            // A membership update grew the view mid-request.
            self.excluded_priorities.resize(priority_set.len(), false);
        }
        self.remaining_in_current_level = 0;
        self.determine_next_priority(priority_set, priority_mapper, skip_to_last_resort);
        tracing::debug!(excluded = ?self.excluded_priorities, "excluded priorities");
        self.invoked_once = true;

        if !self.adjust_for_attempted_priorities(priority_set) {
            self.metrics.load_fallbacks.inc();
            tracing::debug!("no availability left on any level, returning original priority load");
            return original_load;
        }

        tracing::debug!(load = ?self.state.load, "returning recomputed priority load");
        &self.state.load
    }

    fn on_host_attempted(&mut self, host: &Arc<Host>) {
        tracing::trace!(
            hostname = %host.hostname,
            address = %host.address,
            preferred_host_retries = self.preferred_host_retries,
            "host attempted"
        );

        if self.attempted.is_empty() {
            // The request's very first attempt.
            self.attempted.insert(host);
            if self.preferred_host_retries == 0 && self.remaining_in_current_level > 0 {
                self.remaining_in_current_level -= 1;
            }
            return;
        }

        if self.preferred_host_retries > 0 {
            // Another go at the preferred host. Dual-stack setups may
            // present it under a second enumeration entry.
            self.attempted.insert(host);
            self.preferred_host_retries -= 1;
            self.metrics.preferred_host_retries.inc();
            tracing::debug!(
                remaining = self.preferred_host_retries,
                "preferred-host retry spent"
            );
            return;
        }

        if self.remaining_in_current_level > 0 {
            self.remaining_in_current_level -= 1;
        }

        if self.failover_reselects > 0 {
            self.failover_reselects -= 1;
            self.metrics.failover_reselects.inc();
            if self.failover_reselects > 0
                && self.remaining_in_current_level == 0
                && self.current_level == self.range.last_primary
            {
                // The primary range is exhausted; leftover failover budget
                // could never be spent there again.
                self.failover_reselects = 0;
            }
        } else if self.last_resort_reselects > 0 {
            self.last_resort_reselects -= 1;
            self.metrics.last_resort_reselects.inc();
        }
    }

    fn should_retry(&self) -> bool {
        let verdict = self.preferred_host_retries > 0
            || (self.remaining_in_current_level > 0
                && self.reselects_remaining_for(self.current_level))
            || (self.remaining_in_next_level > 0
                && self
                    .next_level
                    .map_or(false, |next| self.reselects_remaining_for(next)));

        tracing::debug!(
            preferred_host_retries = self.preferred_host_retries,
            failover_reselects = self.failover_reselects,
            last_resort_reselects = self.last_resort_reselects,
            current_level = self.current_level,
            remaining_in_current_level = self.remaining_in_current_level,
            next_level = ?self.next_level,
            remaining_in_next_level = self.remaining_in_next_level,
            verdict,
            "retry verdict"
        );
        verdict
    }
}

// === impl ReselectFactory ===

impl ReselectFactory {
    pub fn new(metrics: ReselectMetrics) -> Self {
        Self { metrics }
    }
}

impl RetryPriorityFactory for ReselectFactory {
    fn name(&self) -> &'static str {
        RESELECT_POLICY_NAME
    }

    fn create_retry_priority(
        &self,
        config: serde_json::Value,
        _max_retries: u32,
    ) -> Result<Box<dyn RetryPriority>> {
        let config = if config.is_null() {
            ReselectConfig::default()
        } else {
            serde_json::from_value(config).context("invalid reselect retry-priority config")?
        };
        Ok(Box::new(ReselectRetryPriority::with_metrics(
            config,
            self.metrics.clone(),
        )))
    }
}
