//! Retry-priority policies steering which priority levels of a cluster
//! receive each retry of a request.
//!
//! Two policies are provided. [`ReselectRetryPriority`] walks the priority
//! range phase by phase: retries against the first host, reselects within
//! the primary range, then a one-way jump into an aggregate cluster's
//! last-resort range. [`PreviousPriorities`] is the simpler stock policy
//! that excludes levels wholesale once their attempt budget is spent.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod distribute;
mod metrics;
mod previous;
mod reselect;
mod tracker;

pub use self::{
    metrics::ReselectMetrics,
    previous::{PreviousPriorities, PreviousPrioritiesConfig, PreviousPrioritiesFactory},
    reselect::{ReselectConfig, ReselectFactory, ReselectRetryPriority},
};

/// Registered name of the phased reselection policy.
pub const RESELECT_POLICY_NAME: &str = "retry_priorities.reselect";

/// Registered name of the stock previous-priorities policy.
pub const PREVIOUS_PRIORITIES_POLICY_NAME: &str = "retry_priorities.previous_priorities";
