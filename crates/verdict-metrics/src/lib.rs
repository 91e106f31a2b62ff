use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod config;

/// A single recorded fetch event.
///
/// Durations are kept as measured; SLA figures are in milliseconds because
/// the SLA itself is configured in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A fetch completed successfully.
    Success {
        /// The fetcher kind that produced the event.
        kind: String,
        /// The request key the fetch was performed under.
        key: String,
        /// How long the fetch took.
        elapsed: Duration,
    },
    /// A fetch failed.
    Failure {
        /// The fetcher kind that produced the event.
        kind: String,
        /// The request key the fetch was performed under.
        key: String,
        /// The rendered fetch error.
        error: String,
        /// How long the fetch took before failing.
        elapsed: Duration,
    },
    /// The rolling average fetch time exceeded the configured SLA.
    SlaBreach {
        /// The fetcher kind that produced the event.
        kind: String,
        /// The request key of the fetch that tipped the average.
        key: String,
        /// The configured SLA, in milliseconds.
        sla_ms: u64,
        /// The rolling average fetch time, in milliseconds.
        average_ms: f64,
    },
}

/// The metrics sink strategy type.
///
/// It represents which metrics sink is currently used.
#[derive(Debug, Clone)]
pub enum Metrics {
    /// Emits metrics as `tracing` events.
    Tracing(TracingMetrics),
    /// Collects metrics into an in-process event log.
    Memory(MemoryMetrics),
    /// Discards all metrics.
    Noop(NoopMetrics),
}

/// The required trait that any metrics sink type must implement.
pub trait Record {
    /// Records a successful fetch.
    fn on_success(&self, kind: &str, key: &str, elapsed: Duration);
    /// Records a failed fetch.
    fn on_failure(&self, kind: &str, key: &str, error: &str, elapsed: Duration);
    /// Records a breach of the configured fetch-time SLA.
    fn on_sla_breach(&self, kind: &str, key: &str, sla_ms: u64, average_ms: f64);
}

impl Record for Metrics {
    fn on_success(&self, kind: &str, key: &str, elapsed: Duration) {
        match self {
            Metrics::Tracing(sink) => sink.on_success(kind, key, elapsed),
            Metrics::Memory(sink) => sink.on_success(kind, key, elapsed),
            Metrics::Noop(sink) => sink.on_success(kind, key, elapsed),
        }
    }

    fn on_failure(&self, kind: &str, key: &str, error: &str, elapsed: Duration) {
        match self {
            Metrics::Tracing(sink) => sink.on_failure(kind, key, error, elapsed),
            Metrics::Memory(sink) => sink.on_failure(kind, key, error, elapsed),
            Metrics::Noop(sink) => sink.on_failure(kind, key, error, elapsed),
        }
    }

    fn on_sla_breach(&self, kind: &str, key: &str, sla_ms: u64, average_ms: f64) {
        match self {
            Metrics::Tracing(sink) => sink.on_sla_breach(kind, key, sla_ms, average_ms),
            Metrics::Memory(sink) => sink.on_sla_breach(kind, key, sla_ms, average_ms),
            Metrics::Noop(sink) => sink.on_sla_breach(kind, key, sla_ms, average_ms),
        }
    }
}

impl Default for Metrics {
    fn default() -> Metrics {
        Metrics::Tracing(TracingMetrics)
    }
}

/// A sink that emits every event through the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl Record for TracingMetrics {
    fn on_success(&self, kind: &str, key: &str, elapsed: Duration) {
        tracing::debug!(kind, key, elapsed_ms = elapsed.as_millis() as u64, "fetch succeeded");
    }

    fn on_failure(&self, kind: &str, key: &str, error: &str, elapsed: Duration) {
        tracing::warn!(kind, key, error, elapsed_ms = elapsed.as_millis() as u64, "fetch failed");
    }

    fn on_sla_breach(&self, kind: &str, key: &str, sla_ms: u64, average_ms: f64) {
        tracing::warn!(kind, key, sla_ms, average_ms, "fetch SLA breached");
    }
}

/// A sink that appends every event to a shared in-process log.
///
/// Useful for embedders that export metrics on their own schedule, and for
/// asserting on emitted events in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetrics {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryMetrics {
    /// Creates an empty in-memory sink.
    pub fn new() -> MemoryMetrics {
        MemoryMetrics::default()
    }

    /// Returns a snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("metrics event log poisoned").clone()
    }

    /// Drains and returns the events recorded so far.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().expect("metrics event log poisoned"))
    }
}

impl Record for MemoryMetrics {
    fn on_success(&self, kind: &str, key: &str, elapsed: Duration) {
        self.events.lock().expect("metrics event log poisoned").push(Event::Success {
            kind: kind.to_owned(),
            key: key.to_owned(),
            elapsed,
        });
    }

    fn on_failure(&self, kind: &str, key: &str, error: &str, elapsed: Duration) {
        self.events.lock().expect("metrics event log poisoned").push(Event::Failure {
            kind: kind.to_owned(),
            key: key.to_owned(),
            error: error.to_owned(),
            elapsed,
        });
    }

    fn on_sla_breach(&self, kind: &str, key: &str, sla_ms: u64, average_ms: f64) {
        self.events.lock().expect("metrics event log poisoned").push(Event::SlaBreach {
            kind: kind.to_owned(),
            key: key.to_owned(),
            sla_ms,
            average_ms,
        });
    }
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Record for NoopMetrics {
    fn on_success(&self, _kind: &str, _key: &str, _elapsed: Duration) {}

    fn on_failure(&self, _kind: &str, _key: &str, _error: &str, _elapsed: Duration) {}

    fn on_sla_breach(&self, _kind: &str, _key: &str, _sla_ms: u64, _average_ms: f64) {}
}
