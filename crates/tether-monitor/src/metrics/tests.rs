//! Unit tests for the metrics collector

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Collector whose clock is driven by the returned cell
fn manual_clock(config: MetricsConfig) -> (MetricsCollector, Arc<Mutex<DateTime<Utc>>>) {
    let now = Arc::new(Mutex::new(at(0)));
    let clock_now = now.clone();
    let collector = MetricsCollector::new(config).with_clock(Arc::new(move || *clock_now.lock()));
    (collector, now)
}

fn ms(base: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
    base + chrono::Duration::milliseconds(millis)
}

mod query_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let collector = MetricsCollector::default();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.queries, QuerySummary::default());
        assert_eq!(snapshot.connections, ConnectionSummary::default());
        assert_eq!(snapshot.queries.average_duration, 0.0);
        assert!(!snapshot.queries.average_duration.is_nan());
    }

    #[test]
    fn test_counts_and_durations() {
        let (collector, _now) = manual_clock(MetricsConfig::default());
        let start = at(0);
        collector.record_query("find", start, ms(start, 10), true);
        collector.record_query("find", start, ms(start, 30), true);
        collector.record_query("insert", start, ms(start, 50), false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.queries.total, 3);
        assert_eq!(snapshot.queries.successful, 2);
        assert_eq!(snapshot.queries.failed, 1);
        assert_eq!(snapshot.queries.average_duration, 30.0);
        assert_eq!(snapshot.queries.slowest_duration, 50.0);
        assert_eq!(snapshot.timestamp, at(0));
    }

    #[test]
    fn test_p95_nearest_rank() {
        let (collector, _now) = manual_clock(MetricsConfig::default());
        let start = at(0);
        for i in 1..=100 {
            collector.record_query("q", start, ms(start, i), true);
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.queries.p95_duration, 95.0);
        assert_eq!(snapshot.queries.slowest_duration, 100.0);
    }

    #[test]
    fn test_ceiling_evicts_oldest_first() {
        let collector = MetricsCollector::default();
        let start = Utc::now();
        for i in 0..10_001 {
            collector.record_query(&format!("op-{i}"), start, start, true);
        }

        assert_eq!(collector.query_count(), 10_000);
        assert_eq!(collector.oldest_query().unwrap().operation, "op-1");
        assert_eq!(collector.snapshot().queries.total, 10_000);
    }

    #[test]
    fn test_retention_excludes_stale_samples() {
        let config = MetricsConfig {
            max_samples: 100,
            retention: Duration::from_secs(60),
        };
        let (collector, now) = manual_clock(config);
        collector.record_query("old", at(0), at(1), true);

        *now.lock() = at(120);
        assert_eq!(collector.snapshot().queries.total, 0);

        collector.record_query("fresh", at(119), at(120), true);
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.queries.total, 1);
        assert_eq!(snapshot.queries.average_duration, 1000.0);
        assert_eq!(collector.query_count(), 1);
    }

    #[test]
    fn test_sample_is_stamped_with_recording_time() {
        let (collector, now) = manual_clock(MetricsConfig::default());
        *now.lock() = at(30);
        collector.record_query("SELECT 1", at(10), ms(at(10), 25), true);

        let sample = collector.oldest_query().unwrap();
        assert_eq!(sample.started_at, at(10));
        assert_eq!(sample.finished_at, ms(at(10), 25));
        assert_eq!(sample.duration_ms, 25.0);
        assert_eq!(sample.timestamp, at(30));

        let json = serde_json::to_value(&sample).unwrap();
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_clear() {
        let collector = MetricsCollector::default();
        let now = Utc::now();
        collector.record_query("q", now, now, true);
        collector.record_connection("db", true);
        collector.clear();

        assert_eq!(collector.query_count(), 0);
        assert_eq!(collector.connection_count(), 0);
    }
}

mod connection_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_counts() {
        let collector = MetricsCollector::default();
        collector.record_connection("orders", false);
        collector.record_connection("orders", true);
        let handle = collector.record_connection("events", true);
        collector.record_disconnection(handle);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.connections.total_attempts, 3);
        assert_eq!(snapshot.connections.successful_connections, 2);
        assert_eq!(snapshot.connections.failed_connections, 1);
        assert_eq!(snapshot.connections.active, 1);
    }

    #[test]
    fn test_failed_attempt_is_never_active() {
        let failed = ConnectionMetric {
            adapter: "orders".to_string(),
            success: false,
            connected_at: at(0),
            disconnected_at: None,
            duration_ms: None,
        };
        assert!(!failed.is_active());

        let open = ConnectionMetric {
            success: true,
            ..failed.clone()
        };
        assert!(open.is_active());

        let closed = ConnectionMetric {
            disconnected_at: Some(at(5)),
            ..open
        };
        assert!(!closed.is_active());
    }

    #[test]
    fn test_disconnection_fills_duration() {
        let (collector, now) = manual_clock(MetricsConfig::default());
        let handle = collector.record_connection("orders", true);

        *now.lock() = at(2);
        assert!(collector.record_disconnection(handle));
        assert!(!collector.record_disconnection(handle));
        assert_eq!(collector.snapshot().connections.active, 0);
    }

    #[test]
    fn test_evicted_handle_is_ignored() {
        let config = MetricsConfig {
            max_samples: 2,
            retention: Duration::from_secs(3600),
        };
        let collector = MetricsCollector::new(config);
        let first = collector.record_connection("a", true);
        collector.record_connection("b", true);
        collector.record_connection("c", true);

        assert_eq!(collector.connection_count(), 2);
        assert!(!collector.record_disconnection(first));
    }

    #[test]
    fn test_open_connection_survives_retention() {
        let config = MetricsConfig {
            max_samples: 100,
            retention: Duration::from_secs(60),
        };
        let (collector, now) = manual_clock(config);
        collector.record_connection("long-lived", true);
        collector.record_connection("failed", false);

        *now.lock() = at(600);
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.connections.active, 1);
        assert_eq!(snapshot.connections.total_attempts, 1);
    }
}

mod snapshot_shape_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_json_field_names() {
        let (collector, _now) = manual_clock(MetricsConfig::default());
        collector.record_query("q", at(0), ms(at(0), 4), true);
        collector.record_connection("db", true);

        let json = serde_json::to_value(collector.snapshot()).unwrap();
        let queries = &json["queries"];
        for key in [
            "total",
            "successful",
            "failed",
            "averageDuration",
            "slowestDuration",
            "p95Duration",
        ] {
            assert!(queries.get(key).is_some(), "missing queries.{key}");
        }
        let connections = &json["connections"];
        for key in [
            "active",
            "totalAttempts",
            "successfulConnections",
            "failedConnections",
        ] {
            assert!(connections.get(key).is_some(), "missing connections.{key}");
        }
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_config_from_observability_settings() {
        let settings = tether_core::ObservabilitySettings {
            metrics_max_samples: 500,
            metrics_retention_secs: 30,
            ..Default::default()
        };
        let config = MetricsConfig::from(&settings);
        assert_eq!(config.max_samples, 500);
        assert_eq!(config.retention, Duration::from_secs(30));
    }
}
