//! OS signal handling for graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tether_core::Result;
use tokio::task::JoinHandle;

use super::{ConnectionLifecycle, DisconnectOutcome};

static HANDLERS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Wait for SIGTERM, SIGINT or Ctrl+C
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("received SIGINT shutdown signal");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM shutdown signal");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C shutdown signal");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("received Ctrl+C shutdown signal");
    Ok(())
}

/// Shut down every manager concurrently
pub async fn shutdown_all(managers: &[Arc<ConnectionLifecycle>]) -> Vec<DisconnectOutcome> {
    futures::future::join_all(managers.iter().map(|m| m.shutdown())).await
}

/// Install OS signal handlers that shut down `managers`.
///
/// Handlers are installed at most once per process; later calls log and
/// return `None`. The returned task finishes once the shutdown has run.
pub fn register_shutdown_handlers(
    managers: Vec<Arc<ConnectionLifecycle>>,
) -> Option<JoinHandle<()>> {
    if HANDLERS_REGISTERED.swap(true, Ordering::SeqCst) {
        tracing::warn!("shutdown handlers already registered");
        return None;
    }
    tracing::debug!(managers = managers.len(), "registering shutdown handlers");
    Some(spawn_shutdown_listener(managers, wait_for_shutdown_signal))
}

/// Shut down `managers` when `next_signal` first resolves.
///
/// Signals that arrive while the shutdown is running are logged and ignored.
pub fn spawn_shutdown_listener<F, Fut>(
    managers: Vec<Arc<ConnectionLifecycle>>,
    mut next_signal: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = next_signal().await {
            tracing::error!(error = %e, "failed to listen for shutdown signals");
            return;
        }

        tracing::info!(adapters = managers.len(), "shutdown signal received, disconnecting");
        let shutdown = shutdown_all(&managers);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                outcomes = &mut shutdown => {
                    let timed_out = outcomes
                        .iter()
                        .filter(|o| **o == DisconnectOutcome::TimedOut)
                        .count();
                    tracing::info!(adapters = outcomes.len(), timed_out, "shutdown complete");
                    break;
                }
                signal = next_signal() => {
                    if signal.is_err() {
                        (&mut shutdown).await;
                        break;
                    }
                    tracing::warn!("shutdown already in progress, ignoring signal");
                }
            }
        }
    })
}
