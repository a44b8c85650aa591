//! Tests for health probing and orchestration

use super::*;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    AdapterState, AggregatedStatus, ConnectionConfig, DatabaseAdapter, EngineKind, EngineSession,
    HealthReport, HealthState, QueryResult, Result, TetherError, Value,
};

enum Behavior {
    Report(HealthState),
    Slow(Duration, HealthState),
    Panic(&'static str),
}

struct StubAdapter {
    name: String,
    behavior: Behavior,
}

fn stub(name: &str, behavior: Behavior) -> Arc<dyn DatabaseAdapter> {
    Arc::new(StubAdapter {
        name: name.to_string(),
        behavior,
    })
}

fn report(name: &str, status: HealthState) -> HealthReport {
    HealthReport::new(name, status)
}

#[async_trait]
impl DatabaseAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn state(&self) -> AdapterState {
        AdapterState::Connected
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn query(&self, _operation: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn health_check(&self) -> HealthReport {
        match &self.behavior {
            Behavior::Report(status) => report(&self.name, *status),
            Behavior::Slow(delay, status) => {
                tokio::time::sleep(*delay).await;
                report(&self.name, *status)
            }
            Behavior::Panic(message) => panic!("{}", message),
        }
    }
}

enum Ping {
    Ok,
    Fail(&'static str),
    Hang,
}

struct ScriptedSession {
    ping: Ping,
}

#[async_trait]
impl EngineSession for ScriptedSession {
    async fn ping(&self) -> Result<()> {
        match self.ping {
            Ping::Ok => Ok(()),
            Ping::Fail(message) => Err(TetherError::Engine(message.to_string())),
            Ping::Hang => std::future::pending().await,
        }
    }

    async fn query(&self, _operation: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn probe(ping: Ping) -> SessionHealthCheck {
    SessionHealthCheck::new(
        "postgres",
        EngineKind::Postgres,
        Arc::new(ScriptedSession { ping }),
        Duration::from_millis(5000),
    )
}

mod aggregate_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_adapters_is_unhealthy() {
        assert_eq!(aggregate(&[]), AggregatedStatus::Unhealthy);
    }

    #[test]
    fn test_all_ready() {
        let reports = [report("a", HealthState::Ready), report("b", HealthState::Ready)];
        assert_eq!(aggregate(&reports), AggregatedStatus::Ready);
    }

    #[test]
    fn test_partial_readiness_is_degraded() {
        let reports = [
            report("a", HealthState::Ready),
            report("b", HealthState::Unhealthy),
        ];
        assert_eq!(aggregate(&reports), AggregatedStatus::Degraded);
    }

    #[test]
    fn test_nothing_ready_is_unhealthy() {
        let reports = [
            report("a", HealthState::Unhealthy),
            report("b", HealthState::Initializing),
        ];
        assert_eq!(aggregate(&reports), AggregatedStatus::Unhealthy);
    }

    #[test]
    fn test_initializing_without_failures_is_ready() {
        let reports = [
            report("a", HealthState::Ready),
            report("b", HealthState::Initializing),
        ];
        assert_eq!(aggregate(&reports), AggregatedStatus::Ready);
    }
}

mod probe_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_successful_probe_is_ready() {
        let report = probe(Ping::Ok).check().await;
        assert_eq!(report.status, HealthState::Ready);
        assert_eq!(report.detail("engine"), Some(&Value::from("postgres")));
        assert!(report.detail("latencyMs").is_some());
    }

    #[tokio::test]
    async fn test_failed_probe_is_unhealthy() {
        let report = probe(Ping::Fail("connection reset")).check().await;
        assert_eq!(report.status, HealthState::Unhealthy);
        assert_eq!(
            report.detail("error"),
            Some(&Value::from("Engine error: connection reset"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let started = tokio::time::Instant::now();
        let report = probe(Ping::Hang).check().await;

        assert_eq!(started.elapsed(), Duration::from_millis(5000));
        assert_eq!(report.status, HealthState::Unhealthy);
        assert_eq!(
            report.detail("error"),
            Some(&Value::from("Health check timed out after 5000ms"))
        );
        assert_eq!(report.detail("timeoutMs"), Some(&Value::from(5000u64)));
    }
}

mod orchestrator_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_panicking_adapter_does_not_abort_fan_out() {
        let orchestrator = HealthOrchestrator::new(vec![
            stub("postgres", Behavior::Report(HealthState::Ready)),
            stub("mongodb", Behavior::Panic("driver exploded")),
        ]);

        let reports = orchestrator.check_all().await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, HealthState::Ready);

        let failed = &reports[1];
        assert_eq!(failed.service, "mongodb");
        assert_eq!(failed.status, HealthState::Unhealthy);
        assert_eq!(failed.detail("error"), Some(&Value::from("driver exploded")));
        assert!(failed.detail("checkedAt").is_some());

        assert_eq!(
            orchestrator.aggregated_status().await,
            AggregatedStatus::Degraded
        );
        assert!(!orchestrator.is_healthy().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_concurrently() {
        let orchestrator = HealthOrchestrator::new(vec![
            stub(
                "postgres",
                Behavior::Slow(Duration::from_secs(5), HealthState::Unhealthy),
            ),
            stub(
                "mongodb",
                Behavior::Slow(Duration::from_secs(5), HealthState::Ready),
            ),
        ]);

        let started = tokio::time::Instant::now();
        let reports = orchestrator.check_all().await;

        assert_eq!(reports.len(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_check_by_name() {
        let orchestrator =
            HealthOrchestrator::new(vec![stub("postgres", Behavior::Report(HealthState::Ready))]);

        let report = orchestrator.check("postgres").await.unwrap();
        assert!(report.is_ready());

        let err = orchestrator.check("redis").await.unwrap_err();
        assert!(matches!(err, TetherError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_orchestrator() {
        let orchestrator = HealthOrchestrator::default();
        assert!(orchestrator.check_all().await.is_empty());
        // Every one of zero reports is ready, yet no adapters aggregates as unhealthy
        assert!(orchestrator.is_healthy().await);
        assert_eq!(
            orchestrator.aggregated_status().await,
            AggregatedStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_add_replaces_and_remove() {
        let orchestrator = HealthOrchestrator::default();
        orchestrator.add(stub("postgres", Behavior::Report(HealthState::Unhealthy)));
        orchestrator.add(stub("postgres", Behavior::Report(HealthState::Ready)));
        assert_eq!(orchestrator.len(), 1);
        assert!(orchestrator.is_healthy().await);

        assert!(orchestrator.remove("postgres"));
        assert!(!orchestrator.remove("postgres"));
        assert!(orchestrator.is_empty());
    }

    #[tokio::test]
    async fn test_summary_serializes() {
        let orchestrator =
            HealthOrchestrator::new(vec![stub("postgres", Behavior::Report(HealthState::Ready))]);
        let summary = orchestrator.summary().await;
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["status"], "ready");
        assert_eq!(json["reports"][0]["service"], "postgres");
        assert!(json.get("checkedAt").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_monitor_keeps_running() {
        let orchestrator = Arc::new(HealthOrchestrator::new(vec![stub(
            "postgres",
            Behavior::Report(HealthState::Ready),
        )]));

        let monitor = orchestrator.spawn_monitor(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!monitor.is_finished());

        monitor.abort();
        let err = monitor.await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_panic());
    }

    #[test]
    fn test_monitor_interval_clamps_zero() {
        assert_eq!(monitor_interval(Duration::ZERO), MIN_MONITOR_INTERVAL);
        assert_eq!(
            monitor_interval(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }
}
