use crate::OMIT_ATTEMPTED_LABEL_PREDICATE_NAME;
use anyhow::{Context, Result};
use retry_policy_core::{
    Host, RetryHostPredicate, RetryHostPredicateFactory, HOST_LABEL_KEY, LB_METADATA_NAMESPACE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Typed configuration of the attempted-label predicate. It carries no
/// fields; the predicate always screens on the `"host"` label.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OmitAttemptedLabelConfig {}

/// Refuses any host labeled like one already attempted.
///
/// The first attempted host's `"host"` label is remembered for the life of
/// the request and never replaced. In dual-stack deployments one logical
/// server surfaces as several enumeration entries sharing this label, so
/// the label is the thing to screen on rather than the host identity. A
/// host without the label stores a null value, which never matches another
/// host's metadata.
#[derive(Debug, Default)]
pub struct OmitAttemptedLabel {
    label_set: Vec<(String, Value)>,
}

/// Builds [`OmitAttemptedLabel`] predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct OmitAttemptedLabelFactory;

// === impl OmitAttemptedLabel ===

impl OmitAttemptedLabel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetryHostPredicate for OmitAttemptedLabel {
    fn should_select_another_host(&self, candidate: &Host, _via_header_hosts: &[String]) -> bool {
        !self.label_set.is_empty()
            && candidate
                .metadata
                .label_match(LB_METADATA_NAMESPACE, &self.label_set)
    }

    fn on_host_attempted(&mut self, host: &Arc<Host>) {
        if self.label_set.is_empty() {
            tracing::debug!(hostname = %host.hostname, "remembering attempted host's label");
            let value = host
                .metadata
                .value(LB_METADATA_NAMESPACE, HOST_LABEL_KEY)
                .cloned()
                .unwrap_or(Value::Null);
            self.label_set.push((HOST_LABEL_KEY.to_string(), value));
        }
    }
}

// === impl OmitAttemptedLabelFactory ===

impl RetryHostPredicateFactory for OmitAttemptedLabelFactory {
    fn name(&self) -> &'static str {
        OMIT_ATTEMPTED_LABEL_PREDICATE_NAME
    }

    fn create_host_predicate(
        &self,
        config: serde_json::Value,
        _max_retries: u32,
    ) -> Result<Box<dyn RetryHostPredicate>> {
        if !config.is_null() {
            let OmitAttemptedLabelConfig {} = serde_json::from_value(config)
                .context("invalid omit-attempted-label predicate config")?;
        }
        Ok(Box::new(OmitAttemptedLabel::new()))
    }
}
