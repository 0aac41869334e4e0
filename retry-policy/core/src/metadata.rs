use ahash::AHashMap as HashMap;
use serde_json::Value;

/// Metadata namespace that carries the load-balancing labels endpoints are
/// grouped by.
pub const LB_METADATA_NAMESPACE: &str = "lb";

/// Label key under [`LB_METADATA_NAMESPACE`] naming the logical server an
/// endpoint belongs to. Dual-stack entries of the same server share it.
pub const HOST_LABEL_KEY: &str = "host";

/// Per-host metadata: namespaced, loosely structured JSON objects attached
/// at endpoint discovery time.
#[derive(Clone, Debug, Default)]
pub struct Metadata(HashMap<String, Value>);

// === impl Metadata ===

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches one namespace object, replacing any previous value.
    pub fn with_namespace(mut self, namespace: impl Into<String>, value: Value) -> Self {
        self.0.insert(namespace.into(), value);
        self
    }

    /// Looks up one key inside a namespace object. `None` when the
    /// namespace is absent, is not an object, or lacks the key.
    pub fn value(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.0.get(namespace)?.get(key)
    }

    /// Whether every label in `labels` matches this metadata under
    /// `namespace`. A label whose stored counterpart is a list matches when
    /// any element equals the label value; a missing key never matches.
    pub fn label_match(&self, namespace: &str, labels: &[(String, Value)]) -> bool {
        let fields = match self.0.get(namespace) {
            Some(Value::Object(fields)) => fields,
            _ => return false,
        };
        labels.iter().all(|(key, expected)| match fields.get(key) {
            Some(Value::Array(items)) => items.iter().any(|item| item == expected),
            Some(value) => value == expected,
            None => false,
        })
    }
}
