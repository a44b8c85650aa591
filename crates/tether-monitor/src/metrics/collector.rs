//! Metrics collector
//!
//! Keeps query and connection samples in insertion order, bounded by a hard
//! sample ceiling and a retention window. Aggregates are recomputed on every
//! snapshot.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tether_core::ObservabilitySettings;

/// Source of "now" for sample timestamps and retention filtering
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Collector limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Hard ceiling per sample sequence; oldest samples are evicted first
    pub max_samples: usize,
    /// Samples older than this are excluded from snapshots and pruned
    pub retention: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            retention: Duration::from_secs(3600),
        }
    }
}

impl From<&ObservabilitySettings> for MetricsConfig {
    fn from(settings: &ObservabilitySettings) -> Self {
        Self {
            max_samples: settings.metrics_max_samples.max(1),
            retention: settings.metrics_retention(),
        }
    }
}

/// One executed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetric {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    /// When the sample was recorded, from the collector's clock
    pub timestamp: DateTime<Utc>,
}

/// One connection attempt, updated when the connection is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetric {
    pub adapter: String,
    pub success: bool,
    pub connected_at: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
}

impl ConnectionMetric {
    pub fn is_active(&self) -> bool {
        self.success && self.disconnected_at.is_none()
    }
}

/// Opaque reference to a recorded connection sample.
///
/// Stays meaningful after other samples are evicted; a handle whose own
/// sample was evicted is simply ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

/// Aggregated query figures. Durations in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub average_duration: f64,
    pub slowest_duration: f64,
    pub p95_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub active: u64,
    pub total_attempts: u64,
    pub successful_connections: u64,
    pub failed_connections: u64,
}

/// Point-in-time view over the retention window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries: QuerySummary,
    pub connections: ConnectionSummary,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Samples {
    queries: VecDeque<QueryMetric>,
    connections: VecDeque<(u64, ConnectionMetric)>,
    next_connection_id: u64,
}

/// Thread-safe metrics collector shared by adapters
pub struct MetricsCollector {
    config: MetricsConfig,
    clock: Clock,
    samples: Mutex<Samples>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let samples = self.samples.lock();
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("queries", &samples.queries.len())
            .field("connections", &samples.connections.len())
            .finish()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            clock: Arc::new(Utc::now),
            samples: Mutex::new(Samples::default()),
        }
    }

    /// Builder method: replace the wall clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> MetricsConfig {
        self.config
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.config.retention) {
            Ok(retention) => now - retention,
            Err(_) => DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Record a finished query
    pub fn record_query(
        &self,
        operation: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        success: bool,
    ) {
        let metric = QueryMetric {
            operation: operation.to_string(),
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            success,
            timestamp: self.now(),
        };
        let cutoff = self.cutoff(metric.timestamp);

        let mut samples = self.samples.lock();
        samples.queries.push_back(metric);
        while samples.queries.len() > self.config.max_samples {
            samples.queries.pop_front();
        }
        while samples
            .queries
            .front()
            .is_some_and(|q| q.finished_at < cutoff)
        {
            samples.queries.pop_front();
        }
    }

    /// Record a connection attempt and return a handle for the later disconnect
    pub fn record_connection(&self, adapter: &str, success: bool) -> ConnectionHandle {
        let now = self.now();
        let cutoff = self.cutoff(now);

        let mut samples = self.samples.lock();
        let id = samples.next_connection_id;
        samples.next_connection_id += 1;
        samples.connections.push_back((
            id,
            ConnectionMetric {
                adapter: adapter.to_string(),
                success,
                connected_at: now,
                disconnected_at: None,
                duration_ms: None,
            },
        ));
        while samples.connections.len() > self.config.max_samples {
            samples.connections.pop_front();
        }
        // Open connections stay regardless of age so the active count holds
        samples
            .connections
            .retain(|(_, c)| c.is_active() || c.connected_at >= cutoff);

        ConnectionHandle(id)
    }

    /// Close the connection sample behind `handle`.
    ///
    /// Returns `false` when the sample has been evicted or was already closed.
    pub fn record_disconnection(&self, handle: ConnectionHandle) -> bool {
        let now = self.now();
        let mut samples = self.samples.lock();
        let Some((_, metric)) = samples
            .connections
            .iter_mut()
            .find(|(id, _)| *id == handle.0)
        else {
            tracing::debug!(?handle, "connection sample no longer held");
            return false;
        };
        if metric.disconnected_at.is_some() {
            return false;
        }
        metric.disconnected_at = Some(now);
        metric.duration_ms = Some(elapsed_ms(metric.connected_at, now));
        true
    }

    /// Aggregate all samples inside the retention window
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = self.now();
        let cutoff = self.cutoff(now);
        let samples = self.samples.lock();

        let mut durations = Vec::new();
        let mut queries = QuerySummary::default();
        for query in samples.queries.iter().filter(|q| q.finished_at >= cutoff) {
            queries.total += 1;
            if query.success {
                queries.successful += 1;
            } else {
                queries.failed += 1;
            }
            durations.push(query.duration_ms);
        }

        let mut connections = ConnectionSummary::default();
        for (_, conn) in samples
            .connections
            .iter()
            .filter(|(_, c)| c.is_active() || c.connected_at >= cutoff)
        {
            connections.total_attempts += 1;
            if conn.success {
                connections.successful_connections += 1;
            } else {
                connections.failed_connections += 1;
            }
            if conn.is_active() {
                connections.active += 1;
            }
        }
        drop(samples);

        if !durations.is_empty() {
            durations.sort_by(|a, b| a.total_cmp(b));
            queries.average_duration = durations.iter().sum::<f64>() / durations.len() as f64;
            queries.slowest_duration = durations[durations.len() - 1];
            queries.p95_duration = percentile(&durations, 0.95);
        }

        MetricsSnapshot {
            queries,
            connections,
            timestamp: now,
        }
    }

    /// Drop every sample
    pub fn clear(&self) {
        let mut samples = self.samples.lock();
        samples.queries.clear();
        samples.connections.clear();
    }

    /// Number of query samples currently held (before retention filtering)
    pub fn query_count(&self) -> usize {
        self.samples.lock().queries.len()
    }

    pub fn connection_count(&self) -> usize {
        self.samples.lock().connections.len()
    }

    /// Oldest query sample still held
    pub fn oldest_query(&self) -> Option<QueryMetric> {
        self.samples.lock().queries.front().cloned()
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let micros = (end - start).num_microseconds().unwrap_or(i64::MAX);
    (micros.max(0) as f64) / 1000.0
}

/// Nearest-rank percentile over sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
