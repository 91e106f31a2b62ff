use serde::{Deserialize, Serialize};

use crate::{Metrics, NoopMetrics, TracingMetrics};

/// The configuration enum for metrics sink strategies.
///
/// ```toml
/// [metrics]
/// type = "<...>" # required, replace "<...>" by the selected strategy.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MetricsConfig {
    /// The 'tracing' metrics strategy (events through the `tracing` macros).
    Tracing,
    /// The 'noop' metrics strategy (all events discarded).
    Noop,
}

impl Default for MetricsConfig {
    fn default() -> MetricsConfig {
        MetricsConfig::Tracing
    }
}

impl From<MetricsConfig> for Metrics {
    fn from(config: MetricsConfig) -> Metrics {
        match config {
            MetricsConfig::Tracing => Metrics::Tracing(TracingMetrics),
            MetricsConfig::Noop => Metrics::Noop(NoopMetrics),
        }
    }
}
