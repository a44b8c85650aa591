//! Health check orchestrator
//!
//! Holds non-owning references to adapters, checks them concurrently and
//! aggregates the results. One misbehaving adapter never aborts the batch.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{AggregatedStatus, DatabaseAdapter, HealthReport, HealthState, Result, TetherError};
use tokio::task::JoinHandle;

/// Shortest period accepted by [`HealthOrchestrator::spawn_monitor`]
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(1);

/// Clamp a polling period so `tokio::time::interval` never sees zero
pub fn monitor_interval(interval: Duration) -> Duration {
    if interval < MIN_MONITOR_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            "monitor interval too short, using the minimum"
        );
        return MIN_MONITOR_INTERVAL;
    }
    interval
}

/// Aggregated status together with the reports it was derived from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub status: AggregatedStatus,
    pub reports: Vec<HealthReport>,
    pub checked_at: DateTime<Utc>,
}

/// Fold reports into one status.
///
/// No adapters is `unhealthy`. No unhealthy report is `ready`. Otherwise
/// `unhealthy` when nothing is ready and `degraded` when something is.
pub fn aggregate(reports: &[HealthReport]) -> AggregatedStatus {
    if reports.is_empty() {
        return AggregatedStatus::Unhealthy;
    }
    let unhealthy = reports
        .iter()
        .filter(|r| r.status == HealthState::Unhealthy)
        .count();
    let ready = reports.iter().filter(|r| r.is_ready()).count();

    if unhealthy == 0 {
        AggregatedStatus::Ready
    } else if ready == 0 {
        AggregatedStatus::Unhealthy
    } else {
        AggregatedStatus::Degraded
    }
}

/// Runs one adapter's health check, converting a panic into an unhealthy report
async fn guarded_check(adapter: Arc<dyn DatabaseAdapter>) -> HealthReport {
    match AssertUnwindSafe(adapter.health_check()).catch_unwind().await {
        Ok(report) => report,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "health check panicked".to_string());
            tracing::error!(adapter = %adapter.name(), error = %message, "health check aborted");
            HealthReport::unhealthy(adapter.name(), message)
                .with_detail("checkedAt", Utc::now().to_rfc3339())
        }
    }
}

/// Fans health checks out to every held adapter
#[derive(Default)]
pub struct HealthOrchestrator {
    adapters: RwLock<Vec<Arc<dyn DatabaseAdapter>>>,
}

impl std::fmt::Debug for HealthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthOrchestrator")
            .field("adapters", &self.names())
            .finish()
    }
}

impl HealthOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn DatabaseAdapter>>) -> Self {
        let orchestrator = Self::default();
        for adapter in adapters {
            orchestrator.add(adapter);
        }
        orchestrator
    }

    /// Add an adapter, replacing any held adapter with the same name
    pub fn add(&self, adapter: Arc<dyn DatabaseAdapter>) {
        let mut adapters = self.adapters.write();
        adapters.retain(|a| a.name() != adapter.name());
        adapters.push(adapter);
    }

    /// Returns `true` if an adapter was removed
    pub fn remove(&self, name: &str) -> bool {
        let mut adapters = self.adapters.write();
        let before = adapters.len();
        adapters.retain(|a| a.name() != name);
        adapters.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters
            .read()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    /// Check every adapter concurrently and wait for all of them
    pub async fn check_all(&self) -> Vec<HealthReport> {
        let adapters = self.adapters.read().clone();
        futures::future::join_all(adapters.into_iter().map(guarded_check)).await
    }

    /// Check one adapter by name
    pub async fn check(&self, name: &str) -> Result<HealthReport> {
        let adapter = self
            .adapters
            .read()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
            .ok_or_else(|| TetherError::NotFound(format!("adapter '{}'", name)))?;
        Ok(guarded_check(adapter).await)
    }

    /// True when every report is ready, so vacuously true with no adapters.
    ///
    /// Use [`aggregated_status`](Self::aggregated_status) to treat an empty
    /// set as unhealthy.
    pub async fn is_healthy(&self) -> bool {
        self.check_all().await.iter().all(HealthReport::is_ready)
    }

    pub async fn aggregated_status(&self) -> AggregatedStatus {
        aggregate(&self.check_all().await)
    }

    /// One fan-out producing both the reports and their aggregate
    pub async fn summary(&self) -> HealthSummary {
        let reports = self.check_all().await;
        HealthSummary {
            status: aggregate(&reports),
            reports,
            checked_at: Utc::now(),
        }
    }

    /// Check all adapters every `interval`, logging aggregated status transitions.
    ///
    /// Runs until the returned handle is aborted. A zero interval is raised
    /// to [`MIN_MONITOR_INTERVAL`].
    pub fn spawn_monitor(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = monitor_interval(interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<AggregatedStatus> = None;

            loop {
                ticker.tick().await;
                let summary = self.summary().await;

                for report in summary
                    .reports
                    .iter()
                    .filter(|r| r.status == HealthState::Unhealthy)
                {
                    tracing::debug!(adapter = %report.service, details = ?report.details, "adapter unhealthy");
                }

                if last != Some(summary.status) {
                    match summary.status {
                        AggregatedStatus::Ready => {
                            tracing::info!(status = %summary.status, adapters = summary.reports.len(), "health status changed")
                        }
                        _ => {
                            tracing::warn!(status = %summary.status, adapters = summary.reports.len(), "health status changed")
                        }
                    }
                    last = Some(summary.status);
                }
            }
        })
    }
}
