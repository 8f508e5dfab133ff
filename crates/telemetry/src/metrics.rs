//! In-process client metrics.
//!
//! Counters are bumped by the request pipeline, the refresh coordinator,
//! the idle watchdog and the pollers; `snapshot()` is logged periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Request latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; 8],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    /// Upper bounds; the last bucket also takes everything above it.
    const BOUNDS_MS: [u64; 8] = [10, 50, 100, 250, 500, 1000, 5000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum_ms: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let idx = Self::BOUNDS_MS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BOUNDS_MS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_ms(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum_ms.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// `(upper bound, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BOUNDS_MS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Metrics for the contract desk client.
#[derive(Debug, Default)]
pub struct Metrics {
    // Request pipeline
    pub requests_sent: Counter,
    pub http_errors: Counter,
    pub network_errors: Counter,
    pub request_latency_ms: LatencyHistogram,

    // Session lifecycle
    pub refresh_calls: Counter,
    pub refresh_failures: Counter,
    pub retries_queued: Counter,
    pub retries_sent: Counter,
    pub forced_logouts: Counter,
    pub idle_timeouts: Counter,

    // Cache
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub stale_responses_dropped: Counter,

    // Pollers
    pub polls: Counter,
    pub poll_errors: Counter,
    pub unread_notifications: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            requests_sent: self.requests_sent.get(),
            http_errors: self.http_errors.get(),
            network_errors: self.network_errors.get(),
            request_latency_mean_ms: self.request_latency_ms.mean_ms(),
            refresh_calls: self.refresh_calls.get(),
            refresh_failures: self.refresh_failures.get(),
            retries_queued: self.retries_queued.get(),
            retries_sent: self.retries_sent.get(),
            forced_logouts: self.forced_logouts.get(),
            idle_timeouts: self.idle_timeouts.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            stale_responses_dropped: self.stale_responses_dropped.get(),
            polls: self.polls.get(),
            poll_errors: self.poll_errors.get(),
            unread_notifications: self.unread_notifications.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub requests_sent: u64,
    pub http_errors: u64,
    pub network_errors: u64,
    pub request_latency_mean_ms: f64,
    pub refresh_calls: u64,
    pub refresh_failures: u64,
    pub retries_queued: u64,
    pub retries_sent: u64,
    pub forced_logouts: u64,
    pub idle_timeouts: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub stale_responses_dropped: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub unread_notifications: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

/// Log the current snapshot at info level.
pub fn log_snapshot() {
    let snap = metrics().snapshot();
    tracing::info!(
        requests = snap.requests_sent,
        http_errors = snap.http_errors,
        network_errors = snap.network_errors,
        latency_mean_ms = snap.request_latency_mean_ms,
        refresh_calls = snap.refresh_calls,
        refresh_failures = snap.refresh_failures,
        idle_timeouts = snap.idle_timeouts,
        unread = snap.unread_notifications,
        "Client metrics"
    );
}
