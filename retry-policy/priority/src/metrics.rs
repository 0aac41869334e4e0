use prometheus_client::{metrics::counter::Counter, registry::Registry};

/// Counters for the reselection policy's routing decisions, shared by every
/// policy instance built from the same factory.
#[derive(Clone, Debug, Default)]
pub struct ReselectMetrics {
    pub(crate) preferred_host_retries: Counter,
    pub(crate) failover_reselects: Counter,
    pub(crate) last_resort_reselects: Counter,
    pub(crate) last_resort_jumps: Counter,
    pub(crate) load_fallbacks: Counter,
}

// === impl ReselectMetrics ===

impl ReselectMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();

        registry.register(
            "retry_preferred_host_attempts",
            "Retries sent back to the first host attempted by a request",
            metrics.preferred_host_retries.clone(),
        );

        registry.register(
            "retry_failover_reselects",
            "Retries reselected to another host within the primary priority range",
            metrics.failover_reselects.clone(),
        );

        registry.register(
            "retry_last_resort_reselects",
            "Retries reselected to a host in the last-resort priority range",
            metrics.last_resort_reselects.clone(),
        );

        registry.register(
            "retry_last_resort_jumps",
            "Requests that skipped remaining primary levels to reach the last-resort range",
            metrics.last_resort_jumps.clone(),
        );

        registry.register(
            "retry_priority_load_fallbacks",
            "Reselect decisions that fell back to the balancer's original priority load",
            metrics.load_fallbacks.clone(),
        );

        metrics
    }
}
