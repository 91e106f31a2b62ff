use serde::{Deserialize, Serialize};

/// The evaluation context handed to every data fetcher of an evaluation.
///
/// A context is a bag of named JSON values (tenant identifiers, request
/// parameters, anything a fetcher needs to locate its data). Fetchers derive
/// their request keys from it; [`Context::fingerprint`] is the canonical
/// derivation for fetchers that want fetches deduplicated per context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: json::Map<String, json::Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Context {
        Context::default()
    }

    /// Adds a named value, builder-style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<json::Value>) -> Context {
        self.insert(key, value);
        self
    }

    /// Adds a named value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Looks up a named value.
    pub fn get(&self, key: &str) -> Option<&json::Value> {
        self.values.get(key)
    }

    /// Whether the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A canonical rendering of the context, usable as a request key.
    ///
    /// Keys are serialized in sorted order, so two contexts holding the same
    /// values fingerprint identically regardless of insertion order.
    pub fn fingerprint(&self) -> String {
        json::Value::Object(self.values.clone()).to_string()
    }
}
