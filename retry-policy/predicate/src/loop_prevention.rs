use crate::LOOP_PREVENTION_PREDICATE_NAME;
use anyhow::{Context, Result};
use retry_policy_core::{Host, RetryHostPredicate, RetryHostPredicateFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Typed configuration of the loop-prevention predicate; carries no fields.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoopPreventionConfig {}

/// Refuses any candidate the request has already passed through, going by
/// the hostnames and endpoint addresses in its via header.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopPrevention;

/// Builds [`LoopPrevention`] predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopPreventionFactory;

// === impl LoopPrevention ===

impl RetryHostPredicate for LoopPrevention {
    fn should_select_another_host(&self, candidate: &Host, via_header_hosts: &[String]) -> bool {
        candidate.in_via_list(via_header_hosts)
    }

    fn on_host_attempted(&mut self, _host: &Arc<Host>) {}
}

// === impl LoopPreventionFactory ===

impl RetryHostPredicateFactory for LoopPreventionFactory {
    fn name(&self) -> &'static str {
        LOOP_PREVENTION_PREDICATE_NAME
    }

    fn create_host_predicate(
        &self,
        config: serde_json::Value,
        _max_retries: u32,
    ) -> Result<Box<dyn RetryHostPredicate>> {
        if !config.is_null() {
            let LoopPreventionConfig {} = serde_json::from_value(config)
                .context("invalid loop-prevention predicate config")?;
        }
        Ok(Box::new(LoopPrevention))
    }
}
