use ahash::AHashMap as HashMap;
use anyhow::{anyhow, bail, Result};
use retry_policy_core::{
    RetryHostPredicate, RetryHostPredicateFactory, RetryPriority, RetryPriorityFactory,
};
use retry_policy_predicate::{LoopPreventionFactory, OmitAttemptedLabelFactory, OmitCanaryFactory};
use retry_policy_priority::{PreviousPrioritiesFactory, ReselectFactory, ReselectMetrics};
use std::{fmt, sync::Arc};

/// Resolves the extension names referenced by routing configuration to
/// their factories.
///
/// Assembled once at startup; cheap to clone and share, since factories
/// are stateless apart from their metric handles.
#[derive(Clone, Default)]
pub struct Registry {
    retry_priorities: HashMap<&'static str, Arc<dyn RetryPriorityFactory>>,
    host_predicates: HashMap<&'static str, Arc<dyn RetryHostPredicateFactory>>,
}

// === impl Registry ===

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in extension registered.
    pub fn with_builtin_plugins() -> Self {
        Self::with_metrics(ReselectMetrics::default())
    }

    /// Like [`Registry::with_builtin_plugins`], with the reselection
    /// policy's decision counters exported through `metrics`.
    pub fn with_metrics(metrics: ReselectMetrics) -> Self {
        let mut registry = Self::new();

        let priorities: [Arc<dyn RetryPriorityFactory>; 2] = [
            Arc::new(ReselectFactory::new(metrics)),
            Arc::new(PreviousPrioritiesFactory),
        ];
        for factory in priorities {
            registry.retry_priorities.insert(factory.name(), factory);
        }

        let predicates: [Arc<dyn RetryHostPredicateFactory>; 3] = [
            Arc::new(OmitAttemptedLabelFactory),
            Arc::new(LoopPreventionFactory),
            Arc::new(OmitCanaryFactory),
        ];
        for factory in predicates {
            registry.host_predicates.insert(factory.name(), factory);
        }

        registry
    }

    /// Registers a retry-priority factory under its own name. Names are
    /// unique; a second registration under the same name is refused.
    pub fn register_retry_priority(
        &mut self,
        factory: Arc<dyn RetryPriorityFactory>,
    ) -> Result<()> {
        let name = factory.name();
        if self.retry_priorities.contains_key(name) {
            bail!("retry priority {name} is already registered");
        }
        self.retry_priorities.insert(name, factory);
        Ok(())
    }

    /// Registers a retry-host-predicate factory under its own name.
    pub fn register_host_predicate(
        &mut self,
        factory: Arc<dyn RetryHostPredicateFactory>,
    ) -> Result<()> {
        let name = factory.name();
        if self.host_predicates.contains_key(name) {
            bail!("retry host predicate {name} is already registered");
        }
        self.host_predicates.insert(name, factory);
        Ok(())
    }

    /// Builds the retry-priority policy registered as `name` from its
    /// typed configuration.
    pub fn create_retry_priority(
        &self,
        name: &str,
        config: serde_json::Value,
        max_retries: u32,
    ) -> Result<Box<dyn RetryPriority>> {
        self.retry_priorities
            .get(name)
            .ok_or_else(|| anyhow!("unknown retry priority: {name}"))?
            .create_retry_priority(config, max_retries)
    }

    /// Builds the retry-host predicate registered as `name` from its typed
    /// configuration.
    pub fn create_host_predicate(
        &self,
        name: &str,
        config: serde_json::Value,
        max_retries: u32,
    ) -> Result<Box<dyn RetryHostPredicate>> {
        self.host_predicates
            .get(name)
            .ok_or_else(|| anyhow!("unknown retry host predicate: {name}"))?
            .create_host_predicate(config, max_retries)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "retry_priorities",
                &self.retry_priorities.keys().collect::<Vec<_>>(),
            )
            .field(
                "host_predicates",
                &self.host_predicates.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
