use std::collections::HashMap;
use std::sync::Arc;

use verdict_metrics::Metrics;

use crate::config::{EngineConfig, FetcherConfig};
use crate::fact::{Fact, FactFetcher};

/// The set of named facts an evaluation can draw from.
///
/// Built once, shared across evaluations; fetcher caches and metrics
/// windows live here and outlive individual evaluations.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    facts: HashMap<String, Fact>,
}

impl Registry {
    /// Starts building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            defaults: FetcherConfig::default(),
            overrides: HashMap::new(),
            metrics: None,
            facts: HashMap::new(),
        }
    }

    /// Looks up the fact registered under `key`.
    pub fn get(&self, key: &str) -> Option<&Fact> {
        self.facts.get(key)
    }

    /// The registered fact keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    /// How many facts are registered.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Whether no facts are registered.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// The builder for [`Registry`] values.
pub struct RegistryBuilder {
    defaults: FetcherConfig,
    overrides: HashMap<String, FetcherConfig>,
    metrics: Option<Metrics>,
    facts: HashMap<String, Fact>,
}

impl RegistryBuilder {
    /// Sets the default configuration for subsequently registered fetchers.
    pub fn defaults(mut self, config: FetcherConfig) -> RegistryBuilder {
        self.defaults = config;
        self
    }

    /// Takes defaults and per-key overrides from an engine configuration.
    pub fn with_config(mut self, config: &EngineConfig) -> RegistryBuilder {
        self.defaults = config.fetcher.clone();
        self.overrides = config.fetchers.clone();
        self
    }

    /// Routes every subsequently registered fetcher's metrics to the given
    /// sink instead of the config-derived one.
    pub fn metrics(mut self, metrics: Metrics) -> RegistryBuilder {
        self.metrics = Some(metrics);
        self
    }

    /// Registers a fetcher under a fact key, using the per-key override
    /// configuration when one is present and the defaults otherwise.
    pub fn register(
        mut self,
        key: impl Into<String>,
        fetcher: impl FactFetcher + 'static,
    ) -> RegistryBuilder {
        let key = key.into();
        let config = self
            .overrides
            .remove(&key)
            .unwrap_or_else(|| self.defaults.clone());
        self.insert(key, Arc::new(fetcher), &config);
        self
    }

    /// Registers a fetcher under a fact key with an explicit configuration.
    pub fn register_with(
        mut self,
        key: impl Into<String>,
        fetcher: impl FactFetcher + 'static,
        config: &FetcherConfig,
    ) -> RegistryBuilder {
        self.insert(key.into(), Arc::new(fetcher), config);
        self
    }

    fn insert(&mut self, key: String, fetcher: Arc<dyn FactFetcher>, config: &FetcherConfig) {
        let metrics = self
            .metrics
            .clone()
            .unwrap_or_else(|| config.metrics.clone().into());
        let fact = Fact::new(key.clone(), fetcher, config, metrics);
        self.facts.insert(key, fact);
    }

    /// Finalizes the registry.
    pub fn build(self) -> Registry {
        Registry { facts: self.facts }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::{BoxFuture, FutureExt};

    use super::*;
    use crate::context::Context;
    use crate::error::BoxError;
    use crate::fact::FetchResponse;

    struct Constant(json::Value);

    impl FactFetcher for Constant {
        fn fetch_response(
            &self,
            _context: &Context,
        ) -> BoxFuture<'static, Result<FetchResponse, BoxError>> {
            let value = self.0.clone();
            async move { Ok(FetchResponse::new(value)) }.boxed()
        }
    }

    #[test]
    fn lookup_finds_registered_facts() {
        let registry = Registry::builder()
            .register("a", Constant(json::json!(1)))
            .register("b", Constant(json::json!(2)))
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());
        let mut keys: Vec<_> = registry.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn per_key_overrides_apply_at_registration() {
        let mut config = EngineConfig::default();
        config.fetcher.sla_fetch_time = 10;
        config.fetchers.insert(
            "slow".to_owned(),
            FetcherConfig {
                sla_fetch_time: 5_000,
                ..FetcherConfig::default()
            },
        );

        let registry = Registry::builder()
            .with_config(&config)
            .register("slow", Constant(json::json!(null)))
            .register("fast", Constant(json::json!(null)))
            .build();

        // Both facts exist; the override consumed the per-key entry.
        assert!(registry.get("slow").is_some());
        assert!(registry.get("fast").is_some());
    }
}
