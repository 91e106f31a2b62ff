use serde::{Deserialize, Serialize};

/// The 'memory' configuration.
pub mod memory;

use crate::config::memory::MemoryCacheConfig;
use crate::FactCache;

/// The configuration enum for fact caching strategies.
///
/// ```toml
/// [cache]
/// type = "<...>" # required, replace "<...>" by the selected strategy.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CacheConfig {
    /// The 'memory' caching strategy (bounded in-process TTL cache).
    Memory(MemoryCacheConfig),
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig::Memory(MemoryCacheConfig::default())
    }
}

impl<V> From<CacheConfig> for FactCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn from(config: CacheConfig) -> FactCache<V> {
        match config {
            CacheConfig::Memory(config) => FactCache::Memory(config.into()),
        }
    }
}
