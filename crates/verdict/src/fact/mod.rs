use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use ring::rand::{SecureRandom, SystemRandom};

use verdict_cache::error::Error as CacheError;
use verdict_cache::{FactCache, Memoizer};
use verdict_metrics::{Metrics, Record};

mod registry;
mod window;

pub use crate::fact::registry::{Registry, RegistryBuilder};
pub use crate::fact::window::RollingWindow;

use crate::config::FetcherConfig;
use crate::context::Context;
use crate::error::{BoxError, FetchError};

/// The payload a data fetcher resolves with.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    data: json::Value,
}

impl FetchResponse {
    /// Wraps a fetched value.
    pub fn new(data: impl Into<json::Value>) -> FetchResponse {
        FetchResponse { data: data.into() }
    }

    /// The fetched value.
    pub fn data(&self) -> &json::Value {
        &self.data
    }

    /// Unwraps the fetched value.
    pub fn into_data(self) -> json::Value {
        self.data
    }
}

/// The required trait that any data fetcher must implement.
///
/// A fetcher produces the value of one named fact on demand. The engine
/// wraps every registered fetcher with a request-key cache, a rolling
/// fetch-time window, and a metrics sink (see [`Fact`]).
pub trait FactFetcher: Send + Sync {
    /// Resolves the fact value for the given evaluation context.
    fn fetch_response(&self, context: &Context) -> BoxFuture<'static, Result<FetchResponse, BoxError>>;

    /// Derives the cache key for the given evaluation context.
    ///
    /// The default returns a fresh random string per call, which makes every
    /// fetch a cache miss: caching is opt-in by overriding this (usually as
    /// some projection of the context, e.g. [`Context::fingerprint`]).
    fn calculate_request_key(&self, context: &Context) -> String {
        let _ = context;
        random_request_key()
    }

    /// Hook invoked whenever the rolling average fetch time exceeds the
    /// configured SLA. The default does nothing.
    fn when_failing_sla(&self, key: &str, sla_ms: u64, average_ms: f64) {
        let _ = (key, sla_ms, average_ms);
    }

    /// The fetcher kind reported in metrics events.
    fn kind(&self) -> &str {
        "fetcher"
    }
}

/// Generates a fresh random hex request key.
pub fn random_request_key() -> String {
    let mut data = [0u8; 16];
    let rng = SystemRandom::new();
    rng.fill(&mut data).expect("system RNG failure");
    hex::encode(data)
}

/// A registered fact: a data fetcher together with its cache, rolling
/// fetch-time window, and metrics sink.
#[derive(Clone)]
pub struct Fact {
    key: String,
    fetcher: Arc<dyn FactFetcher>,
    cache: FactCache<json::Value>,
    stats: Arc<FetchStats>,
}

struct FetchStats {
    sla_fetch_time: u64,
    window: Mutex<RollingWindow>,
    metrics: Metrics,
}

impl Fact {
    pub(crate) fn new(
        key: String,
        fetcher: Arc<dyn FactFetcher>,
        config: &FetcherConfig,
        metrics: Metrics,
    ) -> Fact {
        Fact {
            cache: config.cache.clone().into(),
            stats: Arc::new(FetchStats {
                sla_fetch_time: config.sla_fetch_time,
                window: Mutex::new(RollingWindow::new(config.metrics_times_to_sample)),
                metrics,
            }),
            key,
            fetcher,
        }
    }

    /// The fact key the fetcher is registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fetches the fact value for the given context.
    ///
    /// The request key comes from the fetcher; the cache guarantees one
    /// in-flight load per key, so within an evaluation a deterministic key
    /// means at most one `fetch_response` call. Successful fetches feed the
    /// rolling window and the SLA check; failures are evicted so the next
    /// fetch retries.
    pub async fn fetch(&self, context: &Context) -> Result<json::Value, FetchError> {
        let request_key = self.fetcher.calculate_request_key(context);
        let fetcher = Arc::clone(&self.fetcher);
        let stats = Arc::clone(&self.stats);
        let context = context.clone();
        self.cache
            .get(&request_key, move |key| {
                async move {
                    let started = Instant::now();
                    match fetcher.fetch_response(&context).await {
                        Ok(response) => {
                            stats.record_success(fetcher.as_ref(), &key, started.elapsed());
                            Ok(response.into_data())
                        }
                        Err(err) => {
                            stats.metrics.on_failure(
                                fetcher.kind(),
                                &key,
                                &err.to_string(),
                                started.elapsed(),
                            );
                            Err(CacheError::Load(err.to_string()))
                        }
                    }
                }
                .boxed()
            })
            .await
            .map_err(FetchError::from)
    }

    /// The rolling average fetch time, in milliseconds (0.0 when no fetch
    /// has completed yet).
    pub fn average_fetch_time(&self) -> f64 {
        self.stats
            .window
            .lock()
            .expect("metrics window poisoned")
            .average_ms()
    }

    /// The fetcher's request-key cache.
    pub fn cache(&self) -> &FactCache<json::Value> {
        &self.cache
    }
}

impl FetchStats {
    fn record_success(&self, fetcher: &dyn FactFetcher, key: &str, elapsed: Duration) {
        self.metrics.on_success(fetcher.kind(), key, elapsed);
        let average_ms = {
            let mut window = self.window.lock().expect("metrics window poisoned");
            window.push(elapsed);
            window.average_ms()
        };
        // The mean, not the single observation, to damp outliers. Failures
        // never reach this point.
        if self.sla_fetch_time > 0 && average_ms > self.sla_fetch_time as f64 {
            self.metrics
                .on_sla_breach(fetcher.kind(), key, self.sla_fetch_time, average_ms);
            fetcher.when_failing_sla(key, self.sla_fetch_time, average_ms);
        }
    }
}

impl std::fmt::Debug for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fact")
            .field("key", &self.key)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStats")
            .field("sla_fetch_time", &self.sla_fetch_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use verdict_metrics::{Event, MemoryMetrics};

    use super::*;

    struct StubFetcher {
        calls: Arc<AtomicUsize>,
        sla_hits: Arc<AtomicUsize>,
        delay: Duration,
        result: Result<json::Value, String>,
        deterministic: bool,
    }

    impl StubFetcher {
        fn returning(value: impl Into<json::Value>) -> StubFetcher {
            StubFetcher {
                calls: Arc::new(AtomicUsize::new(0)),
                sla_hits: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
                result: Ok(value.into()),
                deterministic: true,
            }
        }

        fn failing(message: &str) -> StubFetcher {
            StubFetcher {
                result: Err(message.to_owned()),
                ..StubFetcher::returning(json::Value::Null)
            }
        }
    }

    impl FactFetcher for StubFetcher {
        fn fetch_response(
            &self,
            _context: &Context,
        ) -> BoxFuture<'static, Result<FetchResponse, BoxError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            let result = self.result.clone();
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result.map(FetchResponse::new).map_err(BoxError::from)
            }
            .boxed()
        }

        fn calculate_request_key(&self, context: &Context) -> String {
            if self.deterministic {
                context.fingerprint()
            } else {
                random_request_key()
            }
        }

        fn when_failing_sla(&self, _key: &str, _sla_ms: u64, _average_ms: f64) {
            self.sla_hits.fetch_add(1, Ordering::SeqCst);
        }

        fn kind(&self) -> &str {
            "stub"
        }
    }

    fn fact_with(fetcher: StubFetcher, config: &FetcherConfig, metrics: Metrics) -> Fact {
        Fact::new("fact".to_owned(), Arc::new(fetcher), config, metrics)
    }

    #[tokio::test]
    async fn deterministic_keys_fetch_once_per_context() {
        let fetcher = StubFetcher::returning("value");
        let calls = Arc::clone(&fetcher.calls);
        let fact = fact_with(fetcher, &FetcherConfig::default(), Metrics::default());
        let context = Context::new().with("tenant", "a");

        let first = fact.fetch(&context).await.unwrap();
        let second = fact.fetch(&context).await.unwrap();
        assert_eq!(first, json::json!("value"));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different context derives a different request key.
        fact.fetch(&Context::new().with("tenant", "b")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn the_default_request_key_disables_caching() {
        let fetcher = StubFetcher {
            deterministic: false,
            ..StubFetcher::returning("value")
        };
        let calls = Arc::clone(&fetcher.calls);
        let fact = fact_with(fetcher, &FetcherConfig::default(), Metrics::default());
        let context = Context::new();

        fact.fetch(&context).await.unwrap();
        fact.fetch(&context).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_fetches_breach_the_sla_exactly_once_each() {
        let fetcher = StubFetcher {
            delay: Duration::from_millis(8),
            ..StubFetcher::returning("value")
        };
        let sla_hits = Arc::clone(&fetcher.sla_hits);
        let sink = MemoryMetrics::new();
        let config = FetcherConfig {
            sla_fetch_time: 1,
            ..FetcherConfig::default()
        };
        let fact = fact_with(fetcher, &config, Metrics::Memory(sink.clone()));

        assert_eq!(fact.average_fetch_time(), 0.0);
        fact.fetch(&Context::new().with("n", 1)).await.unwrap();
        assert!(fact.average_fetch_time() > 1.0);
        assert_eq!(sla_hits.load(Ordering::SeqCst), 1);

        let breaches = sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, Event::SlaBreach { sla_ms: 1, .. }))
            .count();
        assert_eq!(breaches, 1);
    }

    #[tokio::test]
    async fn fast_fetches_never_breach() {
        let fetcher = StubFetcher::returning("value");
        let sla_hits = Arc::clone(&fetcher.sla_hits);
        let sink = MemoryMetrics::new();
        let config = FetcherConfig {
            sla_fetch_time: 10_000,
            ..FetcherConfig::default()
        };
        let fact = fact_with(fetcher, &config, Metrics::Memory(sink.clone()));

        fact.fetch(&Context::new()).await.unwrap();
        assert_eq!(sla_hits.load(Ordering::SeqCst), 0);
        assert!(sink
            .events()
            .iter()
            .all(|event| matches!(event, Event::Success { .. })));
    }

    #[tokio::test]
    async fn failures_record_metrics_skip_the_sla_and_retry() {
        let fetcher = StubFetcher {
            delay: Duration::from_millis(8),
            ..StubFetcher::failing("connection reset")
        };
        let calls = Arc::clone(&fetcher.calls);
        let sla_hits = Arc::clone(&fetcher.sla_hits);
        let sink = MemoryMetrics::new();
        let config = FetcherConfig {
            sla_fetch_time: 1,
            ..FetcherConfig::default()
        };
        let fact = fact_with(fetcher, &config, Metrics::Memory(sink.clone()));
        let context = Context::new();

        let err = fact.fetch(&context).await.unwrap_err();
        assert_eq!(err.message(), "connection reset");
        assert_eq!(sla_hits.load(Ordering::SeqCst), 0);
        assert!(matches!(sink.events().as_slice(), [Event::Failure { .. }]));

        // The failed entry was evicted, so the next fetch retries.
        fact.fetch(&context).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
