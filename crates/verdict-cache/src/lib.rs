use futures::future::BoxFuture;

pub mod config;
pub mod error;
/// In-memory bounded TTL cache.
pub mod memory;

use crate::error::Error;
use crate::memory::MemoryCache;

/// The fact caching strategy type.
///
/// It represents which memoization strategy is currently used.
#[derive(Debug, Clone)]
pub enum FactCache<V> {
    /// In-process memoization with a bounded TTL cache.
    Memory(MemoryCache<V>),
}

/// The required trait that any fact caching type must implement.
///
/// The contract, for any key `K`:
///
/// - concurrent calls for `K` before the loader completes share one in-flight
///   future (the loader runs at most once);
/// - a completed value stays cached until TTL expiry or invalidation;
/// - a failed load is dropped from the cache upon completion, so the next
///   call for `K` retries.
pub trait Memoizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Looks up `key`, invoking `loader` on a miss.
    ///
    /// The returned future resolves once the (possibly shared) load settles.
    fn get<F>(&self, key: &str, loader: F) -> BoxFuture<'static, Result<V, Error>>
    where
        F: FnOnce(String) -> BoxFuture<'static, Result<V, Error>> + Send + 'static;

    /// Drops the entry bound to `key`, if any.
    fn invalidate(&self, key: &str);

    /// Drops every entry.
    fn clear(&self);

    /// The number of live entries (loading or loaded).
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Memoizer<V> for FactCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get<F>(&self, key: &str, loader: F) -> BoxFuture<'static, Result<V, Error>>
    where
        F: FnOnce(String) -> BoxFuture<'static, Result<V, Error>> + Send + 'static,
    {
        match self {
            FactCache::Memory(cache) => cache.get(key, loader),
        }
    }

    fn invalidate(&self, key: &str) {
        match self {
            FactCache::Memory(cache) => cache.invalidate(key),
        }
    }

    fn clear(&self) {
        match self {
            FactCache::Memory(cache) => cache.clear(),
        }
    }

    fn len(&self) -> usize {
        match self {
            FactCache::Memory(cache) => cache.len(),
        }
    }
}
