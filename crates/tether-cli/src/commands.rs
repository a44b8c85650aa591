//! `check`, `watch` and `exec` command handlers

use anyhow::{Context, bail};
use std::sync::Arc;
use std::time::Duration;
use tether_connection::{
    AdapterRegistry, ConnectionLifecycle, HealthSummary, monitor_interval,
    register_shutdown_handlers, shutdown_all,
};
use tether_core::{CommandExecutor, ResolvedConfig};
use tether_drivers::AdapterFactory;
use tether_monitor::MetricsCollector;

use crate::output;

/// Load, overlay `TETHER_*` variables and validate a configuration file
pub fn load_config(path: &std::path::Path) -> anyhow::Result<ResolvedConfig> {
    let mut config = ResolvedConfig::load(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.apply_env_overrides(std::env::vars())?;
    config.validate()?;
    Ok(config)
}

/// Everything built from one resolved configuration
pub struct Runtime {
    config: ResolvedConfig,
    registry: AdapterRegistry,
    lifecycles: Vec<Arc<ConnectionLifecycle>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Runtime {
    pub fn build(config: ResolvedConfig) -> anyhow::Result<Self> {
        let factory = AdapterFactory::new(&config);
        let registry = factory.build_registry(&config.adapters)?;
        let lifecycles = factory.build_lifecycles(&registry, &config.adapters)?;
        tracing::info!(adapters = registry.len(), "adapters registered");
        Ok(Self {
            metrics: factory.metrics().cloned(),
            config,
            registry,
            lifecycles,
        })
    }

    /// Connect every adapter concurrently.
    ///
    /// Failures are logged and left for the health check to report.
    pub async fn initialize_all(&self) -> usize {
        let results =
            futures::future::join_all(self.lifecycles.iter().map(|l| l.initialize())).await;

        let mut failed = 0;
        for (lifecycle, result) in self.lifecycles.iter().zip(results) {
            if let Err(e) = result {
                let classified = e.classify();
                tracing::error!(
                    adapter = %lifecycle.name(),
                    code = classified.code.as_str(),
                    retryable = classified.retryable,
                    error = %classified.message,
                    "adapter failed to connect"
                );
                failed += 1;
            }
        }
        failed
    }

    pub async fn summary(&self) -> HealthSummary {
        self.registry.health_orchestrator().summary().await
    }

    pub async fn shutdown(&self) {
        let outcomes = shutdown_all(&self.lifecycles).await;
        tracing::debug!(adapters = outcomes.len(), "adapters shut down");
    }

    fn log_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            let snapshot = metrics.snapshot();
            tracing::info!(
                queries = snapshot.queries.total,
                failed = snapshot.queries.failed,
                p95_ms = snapshot.queries.p95_duration,
                active_connections = snapshot.connections.active,
                "metrics snapshot"
            );
        }
    }
}

/// Print every adapter's health. Returns whether all are ready.
pub async fn check(runtime: &Runtime, json: bool) -> anyhow::Result<bool> {
    runtime.initialize_all().await;
    let summary = runtime.summary().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", output::health_table(&summary));
        println!("{}", output::status_line(&summary));
        if let Some(metrics) = &runtime.metrics {
            println!("{}", output::metrics_table(&metrics.snapshot()));
        }
    }

    runtime.shutdown().await;
    Ok(summary.reports.iter().all(|r| r.is_ready()) && !summary.reports.is_empty())
}

/// Monitor until a shutdown signal has been handled
pub async fn watch(runtime: &Runtime, interval: Option<Duration>) -> anyhow::Result<()> {
    runtime.initialize_all().await;

    let Some(mut shutdown) = register_shutdown_handlers(runtime.lifecycles.clone()) else {
        bail!("shutdown handlers are already registered in this process");
    };

    let interval = monitor_interval(interval.unwrap_or_else(|| runtime.config.health.interval()));
    let orchestrator = Arc::new(runtime.registry.health_orchestrator());
    let monitor = orchestrator.spawn_monitor(interval);
    tracing::info!(interval_secs = interval.as_secs(), "watching adapters");

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("shutdown task failed")?;
                break;
            }
            _ = ticker.tick() => runtime.log_metrics(),
        }
    }

    monitor.abort();
    Ok(())
}

/// Run `command` once every adapter is ready. Returns whether it succeeded.
pub async fn exec(
    runtime: &Runtime,
    executor: &dyn CommandExecutor,
    command: &[String],
) -> anyhow::Result<bool> {
    let Some((program, args)) = command.split_first() else {
        bail!("no command given");
    };

    runtime.initialize_all().await;
    let summary = runtime.summary().await;
    if summary.reports.is_empty() || !summary.reports.iter().all(|r| r.is_ready()) {
        eprintln!("{}", output::health_table(&summary));
        eprintln!("{}", output::status_line(&summary));
        runtime.shutdown().await;
        tracing::error!(status = %summary.status, "adapters not ready, refusing to run command");
        return Ok(false);
    }

    let result = executor.execute(program, args).await;
    runtime.shutdown().await;

    match result {
        Ok(output) => {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            Ok(true)
        }
        Err(e) => {
            tracing::error!(command = %program, error = %e, "command failed");
            Ok(false)
        }
    }
}
