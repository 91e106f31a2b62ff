use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;

use crate::error::Error;
use crate::Memoizer;

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, Error>>>;

/// The in-memory fact caching strategy.
///
/// Entries memoize both in-flight and completed loads behind a shared
/// future, expire a fixed duration after being written, and are bounded in
/// number with least-recently-used eviction.
pub struct MemoryCache<V> {
    maximum_size: usize,
    expire_after_write: Option<Duration>,
    executor: Option<Handle>,
    inner: Arc<Mutex<Inner<V>>>,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Monotonic access counter, used as the recency stamp.
    tick: u64,
    /// Monotonic insertion counter, used to tie failure eviction to the
    /// exact load that failed.
    generation: u64,
}

struct Entry<V> {
    load: SharedLoad<V>,
    written_at: Instant,
    last_access: u64,
    generation: u64,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache bounded to `maximum_size` entries, each expiring
    /// `expire_after_write` after insertion (`None` disables expiry).
    pub fn new(maximum_size: usize, expire_after_write: Option<Duration>) -> MemoryCache<V> {
        MemoryCache {
            maximum_size,
            expire_after_write,
            executor: None,
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
                generation: 0,
            })),
        }
    }

    /// Runs loaders on the given runtime handle instead of driving them from
    /// the awaiting tasks.
    ///
    /// A spawned load keeps running even after every waiter has abandoned it,
    /// and its value remains cacheable.
    pub fn with_executor(mut self, executor: Handle) -> MemoryCache<V> {
        self.executor = Some(executor);
        self
    }

    fn spawn_load(&self, load: BoxFuture<'static, Result<V, Error>>) -> SharedLoad<V> {
        match &self.executor {
            Some(handle) => {
                let task = handle.spawn(load);
                async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) if err.is_panic() => {
                            Err(Error::Load(format!("cache loader panicked: {err}")))
                        }
                        Err(_) => Err(Error::Cancelled),
                    }
                }
                .boxed()
                .shared()
            }
            None => load.shared(),
        }
    }

    fn evict_over_capacity(&self, inner: &mut Inner<V>) {
        while inner.entries.len() > self.maximum_size {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    tracing::trace!(key = key.as_str(), "cache entry evicted");
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn prune_expired(&self, inner: &mut Inner<V>) {
        if let Some(ttl) = self.expire_after_write {
            let now = Instant::now();
            inner.entries.retain(|key, entry| {
                let live = now.duration_since(entry.written_at) < ttl;
                if !live {
                    tracing::trace!(key = key.as_str(), "cache entry expired");
                }
                live
            });
        }
    }
}

impl<V> Memoizer<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get<F>(&self, key: &str, loader: F) -> BoxFuture<'static, Result<V, Error>>
    where
        F: FnOnce(String) -> BoxFuture<'static, Result<V, Error>> + Send + 'static,
    {
        let (load, generation) = {
            let mut inner = self.inner.lock().expect("cache state poisoned");
            inner.tick += 1;
            let tick = inner.tick;
            self.prune_expired(&mut inner);

            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.last_access = tick;
                    (entry.load.clone(), entry.generation)
                }
                None => {
                    let load = self.spawn_load(loader(key.to_owned()));
                    inner.generation += 1;
                    let generation = inner.generation;
                    inner.entries.insert(
                        key.to_owned(),
                        Entry {
                            load: load.clone(),
                            written_at: Instant::now(),
                            last_access: tick,
                            generation,
                        },
                    );
                    self.evict_over_capacity(&mut inner);
                    (load, generation)
                }
            }
        };

        let inner = Arc::clone(&self.inner);
        let key = key.to_owned();
        async move {
            let result = load.await;
            if result.is_err() {
                // Failed loads must not persist. The generation check keeps a
                // newer load for the same key from being evicted by a stale
                // failure noticed late.
                let mut inner = inner.lock().expect("cache state poisoned");
                if inner.entries.get(&key).map(|entry| entry.generation) == Some(generation) {
                    inner.entries.remove(&key);
                }
            }
            result
        }
        .boxed()
    }

    fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().expect("cache state poisoned");
        inner.entries.remove(key);
    }

    fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache state poisoned");
        inner.entries.clear();
    }

    fn len(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache state poisoned");
        self.prune_expired(&mut inner);
        inner.entries.len()
    }
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> MemoryCache<V> {
        MemoryCache {
            maximum_size: self.maximum_size,
            expire_after_write: self.expire_after_write,
            executor: self.executor.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("maximum_size", &self.maximum_size)
            .field("expire_after_write", &self.expire_after_write)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn loader(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        result: Result<u32, Error>,
    ) -> impl FnOnce(String) -> BoxFuture<'static, Result<u32, Error>> + Send + 'static {
        move |_key| {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_load() {
        let cache = MemoryCache::new(16, None);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(
            "k",
            loader(Arc::clone(&calls), Duration::from_millis(20), Ok(7)),
        );
        let second = cache.get(
            "k",
            loader(Arc::clone(&calls), Duration::from_millis(20), Ok(9)),
        );
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn completed_values_stay_cached() {
        let cache = MemoryCache::new(16, None);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(1)))
            .await;
        let second = cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(2)))
            .await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_loads_are_retried() {
        let cache = MemoryCache::new(16, None);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get(
                "k",
                loader(
                    Arc::clone(&calls),
                    Duration::ZERO,
                    Err(Error::Load("boom".into())),
                ),
            )
            .await;
        assert_eq!(first, Err(Error::Load("boom".into())));
        assert_eq!(cache.len(), 0);

        let second = cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(3)))
            .await;
        assert_eq!(second, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn entries_expire_after_write() {
        let cache = MemoryCache::new(16, Some(Duration::from_millis(25)));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let reloaded = cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(2)))
            .await
            .unwrap();

        assert_eq!(reloaded, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = MemoryCache::new(2, None);
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b", "c"] {
            cache
                .get(key, loader(Arc::clone(&calls), Duration::ZERO, Ok(0)))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);

        // "a" was the least recently used entry, so it must reload.
        cache
            .get("a", loader(Arc::clone(&calls), Duration::ZERO, Ok(0)))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn invalidate_and_clear_drop_entries() {
        let cache = MemoryCache::new(16, None);
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b"] {
            cache
                .get(key, loader(Arc::clone(&calls), Duration::ZERO, Ok(0)))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);

        cache.invalidate("a");
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn spawned_load_survives_abandonment() {
        let cache =
            MemoryCache::new(16, None).with_executor(tokio::runtime::Handle::current());
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = cache.get(
            "k",
            loader(Arc::clone(&calls), Duration::from_millis(10), Ok(5)),
        );
        drop(abandoned);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let value = cache
            .get("k", loader(Arc::clone(&calls), Duration::ZERO, Ok(99)))
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
