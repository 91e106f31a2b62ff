use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use verdict_cache::config::CacheConfig;
use verdict_metrics::config::MetricsConfig;

/// How the evaluator records children skipped by a short circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SkippedChildren {
    /// Skipped children appear in the result tree with outcome MAYBE.
    #[default]
    Maybe,
    /// Skipped children are omitted from the result tree.
    Omit,
}

/// Evaluator configuration (`[evaluator]` section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// The skipped-children policy; one policy holds for a whole evaluation.
    #[serde(default)]
    pub skipped_children: SkippedChildren,
}

/// Per-fetcher configuration (`[fetcher]` and `[fetchers.<key>]` sections).
///
/// ```toml
/// [fetcher]
/// slaFetchTime = 150         # milliseconds; 0 disables the SLA check
/// metricsTimesToSample = 100 # rolling window size
///
/// [fetcher.metrics]
/// type = "tracing"
///
/// [fetcher.cache]
/// type = "memory"
/// maximumSize = 512
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    /// SLA on the rolling average fetch time, in milliseconds (0 disables).
    #[serde(default)]
    pub sla_fetch_time: u64,
    /// How many fetch durations the rolling window keeps.
    #[serde(default = "FetcherConfig::default_metrics_times_to_sample")]
    pub metrics_times_to_sample: usize,
    /// The metrics sink fetch events are emitted to.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// The cache fetches are memoized in, keyed by request key.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl FetcherConfig {
    fn default_metrics_times_to_sample() -> usize {
        100
    }
}

impl Default for FetcherConfig {
    fn default() -> FetcherConfig {
        FetcherConfig {
            sla_fetch_time: 0,
            metrics_times_to_sample: FetcherConfig::default_metrics_times_to_sample(),
            metrics: MetricsConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// The engine configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Evaluator options.
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    /// The default configuration for registered fetchers.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Per-fact overrides, keyed by fact key.
    #[serde(default)]
    pub fetchers: HashMap<String, FetcherConfig>,
}
