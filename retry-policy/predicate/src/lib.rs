//! Retry-host predicates vetoing individual candidates during retry host
//! selection.
//!
//! [`OmitAttemptedLabel`] refuses hosts that carry the label metadata of a
//! previously attempted host, so a retry cannot land on another enumeration
//! entry of the same logical server. [`LoopPrevention`] refuses hosts the
//! request has already passed through according to its via header.
//! [`OmitCanary`] refuses canary hosts.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod loop_prevention;
mod omit_canary;
mod omit_label;

pub use self::{
    loop_prevention::{LoopPrevention, LoopPreventionConfig, LoopPreventionFactory},
    omit_canary::{OmitCanary, OmitCanaryConfig, OmitCanaryFactory},
    omit_label::{OmitAttemptedLabel, OmitAttemptedLabelConfig, OmitAttemptedLabelFactory},
};

/// Registered name of the attempted-label predicate.
pub const OMIT_ATTEMPTED_LABEL_PREDICATE_NAME: &str = "retry_host_predicates.omit_attempted_label";

/// Registered name of the loop-prevention predicate.
pub const LOOP_PREVENTION_PREDICATE_NAME: &str = "retry_host_predicates.loop_prevention";

/// Registered name of the canary-omission predicate.
pub const OMIT_CANARY_PREDICATE_NAME: &str = "retry_host_predicates.omit_canary";
