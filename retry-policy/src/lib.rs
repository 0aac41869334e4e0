//! Retry-policy extensions for a prioritized upstream load balancer.
//!
//! Per logical request, the router builds one retry-priority policy and a
//! set of retry-host predicates through the [`Registry`] and drives them as
//! attempts fail: [`RetryPriority::determine_priority_load`] yields the
//! load distribution the next host selection honors, the attempt happens,
//! [`RetryPriority::on_host_attempted`] debits the phase budgets, and
//! [`RetryPriority::should_retry`] decides whether another attempt can
//! still reach somewhere useful. Predicates independently veto individual
//! candidates during host selection.
//!
//! All state is request-scoped and synchronous; the cluster's enumeration
//! view is borrowed per call and never retained.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod registry;

pub use self::registry::Registry;
pub use retry_policy_core::{
    ClusterId, CoarseHealth, Host, HostSet, Metadata, PriorityLoad, PriorityMapper, PrioritySet,
    RetryHostPredicate, RetryHostPredicateFactory, RetryPriority, RetryPriorityFactory,
    HOST_LABEL_KEY, LB_METADATA_NAMESPACE,
};
pub use retry_policy_predicate::{
    LoopPrevention, OmitAttemptedLabel, OmitCanary, LOOP_PREVENTION_PREDICATE_NAME,
    OMIT_ATTEMPTED_LABEL_PREDICATE_NAME, OMIT_CANARY_PREDICATE_NAME,
};
pub use retry_policy_priority::{
    PreviousPriorities, PreviousPrioritiesConfig, ReselectConfig, ReselectMetrics,
    ReselectRetryPriority, PREVIOUS_PRIORITIES_POLICY_NAME, RESELECT_POLICY_NAME,
};
