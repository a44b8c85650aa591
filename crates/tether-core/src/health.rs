//! Health report types
//!
//! `HealthReport` is the wire-visible shape external monitoring parses:
//! `{ "service": ..., "status": "ready" | "initializing" | "unhealthy", "details": {...} }`.

use serde::{Deserialize, Serialize};

use crate::Value;

/// Status of a single adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Can serve traffic now
    Ready,
    /// A connection attempt is in flight
    Initializing,
    /// Not connected, probe failed, or probe timed out
    Unhealthy,
}

impl HealthState {
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthState::Ready)
    }
}

/// Status aggregated across every adapter held by an orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatedStatus {
    Ready,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for AggregatedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatedStatus::Ready => write!(f, "ready"),
            AggregatedStatus::Degraded => write!(f, "degraded"),
            AggregatedStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health report for one service. Produced fresh on every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub service: String,
    pub status: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, Value>>,
}

impl HealthReport {
    pub fn new(service: impl Into<String>, status: HealthState) -> Self {
        Self {
            service: service.into(),
            status,
            details: None,
        }
    }

    pub fn ready(service: impl Into<String>) -> Self {
        Self::new(service, HealthState::Ready)
    }

    pub fn initializing(service: impl Into<String>) -> Self {
        Self::new(service, HealthState::Initializing)
    }

    /// Unhealthy report carrying an explanatory `error` detail
    pub fn unhealthy(service: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(service, HealthState::Unhealthy).with_detail("error", error.into())
    }

    /// Builder method: attach a detail field
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}
