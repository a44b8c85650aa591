//! Adapter, driver and session traits
//!
//! A [`DatabaseAdapter`] is the uniform surface every engine family exposes:
//! connect with retries, disconnect, query, and report health. Engine families
//! plug in below it through [`EngineDriver`] (handshake) and [`EngineSession`]
//! (an established connection).

use crate::{ConnectionConfig, EngineKind, HealthReport, QueryResult, Result, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle state of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl AdapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterState::Disconnected => "disconnected",
            AdapterState::Connecting => "connecting",
            AdapterState::Connected => "connected",
            AdapterState::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform connect/disconnect/query/health surface over one engine connection
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Service name used in health reports and registry lookups
    fn name(&self) -> &str;

    fn engine(&self) -> EngineKind;

    fn state(&self) -> AdapterState;

    fn is_connected(&self) -> bool {
        self.state() == AdapterState::Connected
    }

    /// Establish the connection, retrying per the adapter's retry strategy.
    ///
    /// Calling this while already connected is a no-op. Concurrent callers
    /// share a single handshake.
    async fn connect(&self, config: &ConnectionConfig) -> Result<()>;

    /// Close the connection. A no-op when not connected; close failures are
    /// logged and swallowed.
    async fn disconnect(&self);

    /// Run an engine-specific operation. Fails with `NotInitialized` unless
    /// connected.
    async fn query(&self, operation: &str, params: &[Value]) -> Result<QueryResult>;

    /// Fresh health report. Never fails; problems are reported as `unhealthy`.
    async fn health_check(&self) -> HealthReport;
}

/// Engine family plug-in: validates configuration and performs the handshake
#[async_trait]
pub trait EngineDriver: Send + Sync + 'static {
    /// Identifier (e.g., "postgres", "mongodb")
    fn name(&self) -> &'static str;

    /// Human-readable name (e.g., "PostgreSQL", "MongoDB")
    fn display_name(&self) -> &'static str {
        self.name()
    }

    fn engine(&self) -> EngineKind;

    /// Reject configurations this engine cannot use. Validation failures are
    /// not retried.
    fn validate(&self, config: &ConnectionConfig) -> Result<()>;

    /// Open a session. Includes the engine's own liveness round trip so a
    /// returned session is known to be usable.
    async fn handshake(&self, config: &ConnectionConfig) -> Result<Arc<dyn EngineSession>>;
}

/// An established engine connection
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Cheap round trip proving the engine answers
    async fn ping(&self) -> Result<()>;

    async fn query(&self, operation: &str, params: &[Value]) -> Result<QueryResult>;

    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_state_defaults_to_disconnected() {
        assert_eq!(AdapterState::default(), AdapterState::Disconnected);
    }

    #[test]
    fn test_adapter_state_serialization() {
        assert_eq!(
            serde_json::to_string(&AdapterState::Disconnecting).unwrap(),
            "\"disconnecting\""
        );
        assert_eq!(AdapterState::Connected.to_string(), "connected");
    }
}
