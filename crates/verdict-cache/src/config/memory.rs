use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryCache;

/// The configuration struct for the 'memory' caching strategy.
///
/// ```toml
/// [cache]
/// type = "memory"          # required
/// maximumSize = 512
/// expireAfterWrite = 60000 # milliseconds; omit to keep entries forever
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCacheConfig {
    /// The maximum number of live entries.
    #[serde(default = "MemoryCacheConfig::default_maximum_size")]
    pub maximum_size: usize,
    /// How long after insertion an entry expires, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_write: Option<u64>,
}

impl MemoryCacheConfig {
    fn default_maximum_size() -> usize {
        512
    }
}

impl Default for MemoryCacheConfig {
    fn default() -> MemoryCacheConfig {
        MemoryCacheConfig {
            maximum_size: MemoryCacheConfig::default_maximum_size(),
            expire_after_write: None,
        }
    }
}

impl<V> From<MemoryCacheConfig> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn from(config: MemoryCacheConfig) -> MemoryCache<V> {
        MemoryCache::new(
            config.maximum_size,
            config.expire_after_write.map(Duration::from_millis),
        )
    }
}
