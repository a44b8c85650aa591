//! Timed liveness probe over an engine session

use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::{EngineKind, EngineSession, HealthReport, sanitize_message};

/// Health-check helper bound to one live session.
///
/// Built by an adapter after a successful handshake and dropped on disconnect.
pub struct SessionHealthCheck {
    service: String,
    engine: EngineKind,
    session: Arc<dyn EngineSession>,
    timeout: Duration,
}

impl std::fmt::Debug for SessionHealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHealthCheck")
            .field("service", &self.service)
            .field("engine", &self.engine)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionHealthCheck {
    pub fn new(
        service: impl Into<String>,
        engine: EngineKind,
        session: Arc<dyn EngineSession>,
        timeout: Duration,
    ) -> Self {
        Self {
            service: service.into(),
            engine,
            session,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Race the engine ping against the timeout.
    ///
    /// A ping still running when the timer fires is dropped; it cannot touch
    /// the report already returned.
    pub async fn check(&self) -> HealthReport {
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, self.session.ping()).await {
            Ok(Ok(())) => HealthReport::ready(&self.service)
                .with_detail("engine", self.engine.as_str())
                .with_detail("latencyMs", started.elapsed().as_millis() as u64),
            Ok(Err(e)) => {
                let message = sanitize_message(&e.to_string());
                tracing::debug!(adapter = %self.service, error = %message, "health probe failed");
                HealthReport::unhealthy(&self.service, message)
                    .with_detail("engine", self.engine.as_str())
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::debug!(adapter = %self.service, timeout_ms, "health probe timed out");
                HealthReport::unhealthy(
                    &self.service,
                    format!("Health check timed out after {}ms", timeout_ms),
                )
                .with_detail("engine", self.engine.as_str())
                .with_detail("timeoutMs", timeout_ms)
            }
        }
    }
}
