#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod extension;
mod host;
mod load;
mod metadata;
mod priority_set;

pub use self::{
    extension::{
        PriorityMapper, RetryHostPredicate, RetryHostPredicateFactory, RetryPriority,
        RetryPriorityFactory,
    },
    host::{ClusterId, CoarseHealth, Host},
    load::PriorityLoad,
    metadata::{Metadata, HOST_LABEL_KEY, LB_METADATA_NAMESPACE},
    priority_set::{HostSet, PrioritySet, DEFAULT_OVERPROVISIONING_FACTOR},
};
