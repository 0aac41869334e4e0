use crate::OMIT_CANARY_PREDICATE_NAME;
use anyhow::{Context, Result};
use retry_policy_core::{Host, RetryHostPredicate, RetryHostPredicateFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Typed configuration of the canary-omission predicate; carries no fields.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OmitCanaryConfig {}

/// Refuses hosts marked as canaries, keeping retries on the established
/// fleet.
#[derive(Clone, Copy, Debug, Default)]
pub struct OmitCanary;

/// Builds [`OmitCanary`] predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct OmitCanaryFactory;

// === impl OmitCanary ===

impl RetryHostPredicate for OmitCanary {
    fn should_select_another_host(&self, candidate: &Host, _via_header_hosts: &[String]) -> bool {
        candidate.canary
    }

    fn on_host_attempted(&mut self, _host: &Arc<Host>) {}
}

// === impl OmitCanaryFactory ===

impl RetryHostPredicateFactory for OmitCanaryFactory {
    fn name(&self) -> &'static str {
        OMIT_CANARY_PREDICATE_NAME
    }

    fn create_host_predicate(
        &self,
        config: serde_json::Value,
        _max_retries: u32,
    ) -> Result<Box<dyn RetryHostPredicate>> {
        if !config.is_null() {
            let OmitCanaryConfig {} = serde_json::from_value(config)
                .context("invalid omit-canary predicate config")?;
        }
        Ok(Box::new(OmitCanary))
    }
}
