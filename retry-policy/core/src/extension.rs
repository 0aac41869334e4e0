use crate::{Host, PriorityLoad, PrioritySet};
use std::sync::Arc;

/// Maps a host back to the priority level it currently occupies in the
/// enumeration view, or `None` once a membership update has dropped it.
pub type PriorityMapper<'a> = dyn Fn(&Host) -> Option<usize> + 'a;

/// A retry-priority policy.
///
/// The router instantiates one policy per logical request and drives it
/// from that request's worker, so implementations hold per-request state
/// without synchronization. Each attempt invokes, in order,
/// [`determine_priority_load`], then [`on_host_attempted`] once the attempt
/// was dispatched, then [`should_retry`] when the attempt's outcome calls
/// for another try.
///
/// [`determine_priority_load`]: RetryPriority::determine_priority_load
/// [`on_host_attempted`]: RetryPriority::on_host_attempted
/// [`should_retry`]: RetryPriority::should_retry
pub trait RetryPriority: Send {
    /// Returns the load distribution the next host selection should honor.
    ///
    /// `original_load` is the distribution the generic balancer would use
    /// on its own; a policy that declines to act returns it untouched.
    /// `via_header_hosts` carries the request's parsed via header, one
    /// entry per hop already taken.
    fn determine_priority_load<'a>(
        &'a mut self,
        priority_set: &PrioritySet,
        original_load: &'a PriorityLoad,
        priority_mapper: &PriorityMapper<'_>,
        via_header_hosts: &[String],
    ) -> &'a PriorityLoad;

    /// Records the host the router just dispatched an attempt to.
    fn on_host_attempted(&mut self, host: &Arc<Host>);

    /// Whether another attempt can still reach somewhere useful. Once this
    /// returns `false` the router stops retrying regardless of remaining
    /// generic retry budget.
    fn should_retry(&self) -> bool;
}

/// A retry-host predicate: vetoes individual candidates during retry host
/// selection. Cheap enough to run for every candidate the balancer offers.
pub trait RetryHostPredicate: Send {
    /// `true` to reject `candidate` and ask the balancer for another host.
    fn should_select_another_host(&self, candidate: &Host, via_header_hosts: &[String]) -> bool;

    /// Records an attempted host so later candidates can be screened
    /// against it.
    fn on_host_attempted(&mut self, host: &Arc<Host>);
}

/// Builds [`RetryPriority`] instances from their registered name and typed
/// configuration.
pub trait RetryPriorityFactory: Send + Sync {
    /// The name routing configuration refers to this policy by.
    fn name(&self) -> &'static str;

    /// `config` is the policy's typed configuration as loosely structured
    /// JSON; `Value::Null` stands for an omitted configuration block.
    /// `max_retries` is the route's overall retry allowance.
    fn create_retry_priority(
        &self,
        config: serde_json::Value,
        max_retries: u32,
    ) -> anyhow::Result<Box<dyn RetryPriority>>;
}

/// Builds [`RetryHostPredicate`] instances from their registered name and
/// typed configuration.
pub trait RetryHostPredicateFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// `max_retries` is the route's overall retry allowance, passed so
    /// predicates that track attempted hosts can size their storage.
    fn create_host_predicate(
        &self,
        config: serde_json::Value,
        max_retries: u32,
    ) -> anyhow::Result<Box<dyn RetryHostPredicate>>;
}
