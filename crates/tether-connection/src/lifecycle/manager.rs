//! Lifecycle facade over one adapter

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tether_core::{ConnectionConfig, DatabaseAdapter, Result, ShutdownSettings};

/// How `disconnect` should wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectOptions {
    /// Wait (bounded by `timeout`) for the adapter to finish closing
    pub wait_for_graceful: bool,
    pub timeout: Duration,
}

impl Default for DisconnectOptions {
    fn default() -> Self {
        Self {
            wait_for_graceful: true,
            timeout: ShutdownSettings::default().graceful_timeout(),
        }
    }
}

impl DisconnectOptions {
    pub fn graceful(timeout: Duration) -> Self {
        Self {
            wait_for_graceful: true,
            timeout,
        }
    }

    /// Start the disconnect and return without waiting for it
    pub fn detached() -> Self {
        Self {
            wait_for_graceful: false,
            ..Self::default()
        }
    }
}

/// What a disconnect request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectOutcome {
    /// The adapter finished disconnecting within the timeout
    Completed,
    /// The timeout fired first; the disconnect keeps running in the background
    TimedOut,
    /// Started without waiting
    Detached,
    /// A shutdown was already in progress
    Skipped,
}

/// Facade guarding initialization and shutdown of one adapter
pub struct ConnectionLifecycle {
    adapter: Arc<dyn DatabaseAdapter>,
    config: ConnectionConfig,
    shutdown_timeout: Duration,
    init: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    shutting_down: AtomicBool,
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("adapter", &self.adapter.name())
            .field("state", &self.adapter.state())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("initialized", &self.is_initialized())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl ConnectionLifecycle {
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        config: ConnectionConfig,
        shutdown: &ShutdownSettings,
    ) -> Self {
        Self {
            adapter,
            config,
            shutdown_timeout: shutdown.graceful_timeout(),
            init: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// The managed adapter, whether or not it is connected
    pub fn handle(&self) -> Arc<dyn DatabaseAdapter> {
        self.adapter.clone()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Connect the adapter once.
    ///
    /// Later calls return the existing handle without another handshake while
    /// the adapter stays connected.
    #[tracing::instrument(skip(self), fields(adapter = %self.adapter.name()))]
    pub async fn initialize(&self) -> Result<Arc<dyn DatabaseAdapter>> {
        let _guard = self.init.lock().await;
        if self.is_initialized() && self.adapter.is_connected() {
            tracing::debug!("already initialized");
            return Ok(self.adapter.clone());
        }

        self.adapter.connect(&self.config).await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("initialized");
        Ok(self.adapter.clone())
    }

    /// Disconnect the adapter.
    ///
    /// A graceful disconnect runs on its own task raced against
    /// `options.timeout`. Losing the race is logged, not escalated, and the
    /// task still finishes the adapter's own state transition.
    #[tracing::instrument(skip(self), fields(adapter = %self.adapter.name()))]
    pub async fn disconnect(&self, options: DisconnectOptions) -> DisconnectOutcome {
        self.initialized.store(false, Ordering::SeqCst);
        let adapter = self.adapter.clone();
        let task = tokio::spawn(async move { adapter.disconnect().await });

        if !options.wait_for_graceful {
            tracing::debug!("disconnect detached");
            return DisconnectOutcome::Detached;
        }

        match tokio::time::timeout(options.timeout, task).await {
            Ok(Ok(())) => DisconnectOutcome::Completed,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "disconnect task failed");
                DisconnectOutcome::Completed
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = options.timeout.as_millis() as u64,
                    "graceful disconnect timed out, continuing shutdown"
                );
                DisconnectOutcome::TimedOut
            }
        }
    }

    /// Graceful disconnect bounded by the configured shutdown timeout.
    ///
    /// Only the first call does anything; later calls return `Skipped`.
    pub async fn shutdown(&self) -> DisconnectOutcome {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::info!(adapter = %self.adapter.name(), "shutdown already in progress");
            return DisconnectOutcome::Skipped;
        }
        tracing::info!(adapter = %self.adapter.name(), timeout_ms = self.shutdown_timeout.as_millis() as u64, "shutting down");
        self.disconnect(DisconnectOptions::graceful(self.shutdown_timeout))
            .await
    }

    /// Forget the initialized and shutting-down flags so the manager can be
    /// initialized and shut down again. Does not touch the adapter.
    pub fn reset(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.shutting_down.store(false, Ordering::SeqCst);
        tracing::debug!(adapter = %self.adapter.name(), "lifecycle reset");
    }
}
