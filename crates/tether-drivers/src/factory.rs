//! Adapter construction from resolved configuration

use std::sync::Arc;
use tether_connection::{
    AdapterRegistry, ConnectionLifecycle, ManagedAdapter, RetryStrategy, StrategyRegistry,
};
use tether_core::{
    ConnectionConfig, DatabaseAdapter, EngineDriver, EngineKind, HealthSettings, ResolvedConfig,
    Result, RetrySettings, ShutdownSettings, TetherError,
};
use tether_monitor::{MetricsCollector, MetricsConfig};


/// Builds managed adapters that share one retry policy, probe timeout and
/// metrics collector.
pub struct AdapterFactory {
    strategies: Arc<StrategyRegistry>,
    retry: RetrySettings,
    health: HealthSettings,
    shutdown: ShutdownSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("strategy", &self.retry.strategy)
            .field("max_retries", &self.retry.max_retries)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AdapterFactory {
    /// Factory for `config`, with the built-in strategies and a fresh metrics
    /// collector when metrics are enabled
    pub fn new(config: &ResolvedConfig) -> Self {
        let metrics = config
            .observability
            .metrics_enabled
            .then(|| Arc::new(MetricsCollector::new(MetricsConfig::from(&config.observability))));
        Self {
            strategies: Arc::new(StrategyRegistry::with_defaults()),
            retry: config.retry.clone(),
            health: config.health.clone(),
            shutdown: config.shutdown.clone(),
            metrics,
        }
    }

    /// Builder method: strategy registry holding custom strategies
    pub fn with_strategies(mut self, strategies: Arc<StrategyRegistry>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Builder method: share an existing collector, or disable metrics with `None`
    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    pub fn strategies(&self) -> &Arc<StrategyRegistry> {
        &self.strategies
    }

    fn managed<D: EngineDriver>(
        &self,
        name: &str,
        driver: D,
        strategy: Arc<dyn RetryStrategy>,
    ) -> Arc<dyn DatabaseAdapter> {
        let adapter = ManagedAdapter::new(name, driver)
            .with_strategy(strategy)
            .with_retry_settings(&self.retry)
            .with_probe_timeout(self.health.probe_timeout());
        match &self.metrics {
            Some(metrics) => Arc::new(adapter.with_metrics(metrics.clone())),
            None => Arc::new(adapter),
        }
    }

    /// Build a disconnected adapter for one connection config.
    ///
    /// Fails with `Validation` if the config is malformed, the retry strategy
    /// is unknown, or the engine's driver was not compiled in.
    pub fn build_adapter(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseAdapter>> {
        config.validate()?;
        let strategy = self.strategies.build(&self.retry)?;
        tracing::debug!(
            adapter = %config.name,
            engine = %config.engine,
            strategy = strategy.name(),
            "building adapter"
        );

        match config.engine {
            #[cfg(feature = "postgres")]
            EngineKind::Postgres => Ok(self.managed(
                &config.name,
                crate::postgres::PostgresDriver::new(),
                strategy,
            )),
            #[cfg(feature = "mongodb")]
            EngineKind::MongoDb => Ok(self.managed(
                &config.name,
                crate::mongodb::MongoDbDriver::new(),
                strategy,
            )),
            #[allow(unreachable_patterns)]
            engine => Err(TetherError::Validation(format!(
                "adapter '{}' needs the {} driver, which is not enabled in this build",
                config.name, engine
            ))),
        }
    }

    /// Build and register an adapter for every config. Duplicate names fail
    /// with `RegistryConflict`.
    pub fn build_registry(&self, configs: &[ConnectionConfig]) -> Result<AdapterRegistry> {
        let registry = AdapterRegistry::new();
        for config in configs {
            registry.register(self.build_adapter(config)?)?;
        }
        Ok(registry)
    }

    /// Wrap every adapter in `registry` that has a config in a lifecycle
    /// manager using the configured shutdown timeout
    pub fn build_lifecycles(
        &self,
        registry: &AdapterRegistry,
        configs: &[ConnectionConfig],
    ) -> Result<Vec<Arc<ConnectionLifecycle>>> {
        configs
            .iter()
            .map(|config| {
                let adapter = registry.get(&config.name).ok_or_else(|| {
                    TetherError::NotFound(format!("adapter '{}' is not registered", config.name))
                })?;
                Ok(Arc::new(ConnectionLifecycle::new(
                    adapter,
                    config.clone(),
                    &self.shutdown,
                )))
            })
            .collect()
    }
}
