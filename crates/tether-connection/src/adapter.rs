//! Managed database adapter
//!
//! [`ManagedAdapter`] implements the uniform adapter contract once for every
//! engine family. The engine-specific parts (validation, handshake, session
//! operations) come from an [`EngineDriver`]; this type owns the state
//! machine, retry loop, health helper and metrics bookkeeping.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tether_core::{
    AdapterState, ConnectionConfig, DatabaseAdapter, EngineDriver, EngineKind, EngineSession,
    HealthReport, HealthSettings, QueryResult, Result, RetrySettings, TetherError, Value,
    sanitize_message,
};
use tether_monitor::{ConnectionHandle, MetricsCollector};

use crate::health::SessionHealthCheck;
use crate::retry::{RetryCoordinator, RetryOptions, RetryOutcome, RetryStrategy};

/// Adapter over one engine connection, generic over the engine family.
///
/// `connect` and `disconnect` are serialized by an internal lock, so
/// concurrent `connect` calls share a single handshake.
pub struct ManagedAdapter<D: EngineDriver> {
    name: String,
    driver: D,
    retry: RetryCoordinator,
    max_retries: u32,
    base_delay: Duration,
    probe_timeout: Duration,
    state: RwLock<AdapterState>,
    /// Held across the handshake and close awaits
    lifecycle: tokio::sync::Mutex<()>,
    session: RwLock<Option<Arc<dyn EngineSession>>>,
    health: RwLock<Option<Arc<SessionHealthCheck>>>,
    metrics: Option<Arc<MetricsCollector>>,
    connection_handle: Mutex<Option<ConnectionHandle>>,
}

impl<D: EngineDriver> std::fmt::Debug for ManagedAdapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedAdapter")
            .field("name", &self.name)
            .field("driver", &self.driver.name())
            .field("state", &*self.state.read())
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<D: EngineDriver> ManagedAdapter<D> {
    /// Adapter with default retry (exponential, 3 retries, 1s base) and a 5s probe timeout
    pub fn new(name: impl Into<String>, driver: D) -> Self {
        let retry = RetrySettings::default();
        Self {
            name: name.into(),
            driver,
            retry: RetryCoordinator::default(),
            max_retries: retry.max_retries,
            base_delay: retry.base_delay(),
            probe_timeout: HealthSettings::default().probe_timeout(),
            state: RwLock::new(AdapterState::Disconnected),
            lifecycle: tokio::sync::Mutex::new(()),
            session: RwLock::new(None),
            health: RwLock::new(None),
            metrics: None,
            connection_handle: Mutex::new(None),
        }
    }

    /// Builder method: retry strategy
    pub fn with_strategy(self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry.set_strategy(strategy);
        self
    }

    /// Builder method: retry count and base delay from settings
    pub fn with_retry_settings(mut self, settings: &RetrySettings) -> Self {
        self.max_retries = settings.max_retries;
        self.base_delay = settings.base_delay();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Builder method: record connection and query samples
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn retry_coordinator(&self) -> &RetryCoordinator {
        &self.retry
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    fn set_state(&self, state: AdapterState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::trace!(adapter = %self.name, from = %previous, to = %state, "adapter state changed");
        }
    }

    /// Drop the session and health helper, close out the connection sample
    /// and land in `Disconnected`
    fn finish_teardown(&self) {
        *self.health.write() = None;
        self.session.write().take();
        let handle = self.connection_handle.lock().take();
        if let (Some(metrics), Some(handle)) = (&self.metrics, handle) {
            metrics.record_disconnection(handle);
        }
        self.set_state(AdapterState::Disconnected);
    }
}

/// Resets an adapter left mid-transition when `connect` or `disconnect`
/// is cancelled before it finishes.
struct TransitionGuard<'a, D: EngineDriver> {
    adapter: Option<&'a ManagedAdapter<D>>,
}

impl<'a, D: EngineDriver> TransitionGuard<'a, D> {
    fn new(adapter: &'a ManagedAdapter<D>) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    fn disarm(mut self) {
        self.adapter = None;
    }
}

impl<D: EngineDriver> Drop for TransitionGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            tracing::warn!(
                adapter = %adapter.name,
                state = %adapter.state(),
                "transition cancelled, resetting to disconnected"
            );
            adapter.finish_teardown();
        }
    }
}

#[async_trait]
impl<D: EngineDriver> DatabaseAdapter for ManagedAdapter<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> EngineKind {
        self.driver.engine()
    }

    fn state(&self) -> AdapterState {
        *self.state.read()
    }

    #[tracing::instrument(skip(self, config), fields(adapter = %self.name, engine = %self.driver.engine()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == AdapterState::Connected {
            tracing::debug!("already connected");
            return Ok(());
        }

        self.driver.validate(config)?;
        self.set_state(AdapterState::Connecting);
        let transition = TransitionGuard::new(self);
        tracing::info!(max_retries = self.max_retries, "connecting");

        let attempts = AtomicU32::new(0);
        let adapter = self.name.clone();
        let options = RetryOptions::new(self.max_retries, self.base_delay).with_on_retry(
            move |outcome: &RetryOutcome<'_, TetherError>| {
                tracing::warn!(
                    adapter = %adapter,
                    attempt = outcome.attempt,
                    delay_ms = outcome.delay.as_millis() as u64,
                    error = %sanitize_message(&outcome.error.to_string()),
                    "connection attempt failed, retrying"
                );
            },
        );

        let driver = &self.driver;
        let counter = &attempts;
        let result = self
            .retry
            .execute(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    driver.handshake(config)
                },
                options,
            )
            .await;
        let attempts = attempts.load(Ordering::SeqCst);
        transition.disarm();

        match result {
            Ok(session) => {
                *self.health.write() = Some(Arc::new(SessionHealthCheck::new(
                    self.name.clone(),
                    self.driver.engine(),
                    session.clone(),
                    self.probe_timeout,
                )));
                *self.session.write() = Some(session);
                self.set_state(AdapterState::Connected);
                if let Some(metrics) = &self.metrics {
                    *self.connection_handle.lock() =
                        Some(metrics.record_connection(&self.name, true));
                }
                tracing::info!(attempts, "connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(AdapterState::Disconnected);
                if let Some(metrics) = &self.metrics {
                    metrics.record_connection(&self.name, false);
                }
                let message = sanitize_message(&e.to_string());
                tracing::error!(attempts, error = %message, "connection failed, retries exhausted");
                Err(TetherError::ConnectionFailed {
                    adapter: self.name.clone(),
                    attempts,
                    message,
                })
            }
        }
    }

    #[tracing::instrument(skip(self), fields(adapter = %self.name))]
    async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        if self.state() != AdapterState::Connected {
            tracing::debug!(state = %self.state(), "not connected, nothing to disconnect");
            return;
        }

        self.set_state(AdapterState::Disconnecting);
        let transition = TransitionGuard::new(self);
        *self.health.write() = None;
        let session = self.session.write().take();

        if let Some(session) = session
            && let Err(e) = session.close().await
        {
            tracing::warn!(error = %sanitize_message(&e.to_string()), "error while closing connection");
        }

        transition.disarm();
        self.finish_teardown();
        tracing::info!("disconnected");
    }

    async fn query(&self, operation: &str, params: &[Value]) -> Result<QueryResult> {
        let session = if self.state() == AdapterState::Connected {
            self.session.read().clone()
        } else {
            None
        };
        let session = session.ok_or_else(|| {
            TetherError::NotInitialized(format!("adapter '{}' is not connected", self.name))
        })?;

        let started_at = Utc::now();
        let result = session.query(operation, params).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_query(operation, started_at, Utc::now(), result.is_ok());
        }

        result.map_err(|e| match e {
            TetherError::QueryFailed(_) => e,
            other => TetherError::QueryFailed(sanitize_message(&other.to_string())),
        })
    }

    async fn health_check(&self) -> HealthReport {
        let helper = self.health.read().clone();
        match helper {
            Some(helper) => helper.check().await,
            None if self.state() == AdapterState::Connecting => {
                HealthReport::initializing(&self.name).with_detail("engine", self.engine().as_str())
            }
            None => HealthReport::unhealthy(&self.name, "adapter is not connected")
                .with_detail("engine", self.engine().as_str()),
        }
    }
}
