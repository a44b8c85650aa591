//! MongoDB driver implementation

use async_trait::async_trait;
use mongodb::Client;
use mongodb::options::ClientOptions;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    ConnectionConfig, EngineDriver, EngineKind, EngineSession, Result, TetherError,
    sanitize_message,
};

use crate::session::MongoDbSession;

/// Database used when neither the config nor the URL names one
const FALLBACK_DATABASE: &str = "admin";

/// MongoDB engine driver
#[derive(Debug, Clone, Copy)]
pub struct MongoDbDriver;

impl MongoDbDriver {
    pub fn new() -> Self {
        tracing::debug!("MongoDB driver initialized");
        Self
    }
}

impl Default for MongoDbDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn pool_size(config: &ConnectionConfig, key: &str) -> Result<Option<u32>> {
    match config.get_u64(key) {
        None if config.params.contains_key(key) => Err(TetherError::Validation(format!(
            "adapter '{}' param '{}' must be a non-negative integer",
            config.name, key
        ))),
        None => Ok(None),
        Some(n) => u32::try_from(n).map(Some).map_err(|_| {
            TetherError::Validation(format!(
                "adapter '{}' param '{}' is too large",
                config.name, key
            ))
        }),
    }
}

/// Forward the adapter's pool hints and timeouts into the client options
pub fn apply_client_options(config: &ConnectionConfig, options: &mut ClientOptions) -> Result<()> {
    let max_pool_size = pool_size(config, "max_pool_size")?;
    let min_pool_size = pool_size(config, "min_pool_size")?;
    if let (Some(min), Some(max)) = (min_pool_size, max_pool_size)
        && min > max
    {
        return Err(TetherError::Validation(format!(
            "adapter '{}' min_pool_size ({}) exceeds max_pool_size ({})",
            config.name, min, max
        )));
    }
    if max_pool_size.is_some() {
        options.max_pool_size = max_pool_size;
    }
    if min_pool_size.is_some() {
        options.min_pool_size = min_pool_size;
    }

    if let Some(ms) = config.get_u64("server_selection_timeout_ms") {
        options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = config.get_u64("connect_timeout_ms") {
        options.connect_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(app_name) = config
        .get_string("app_name")
        .or_else(|| config.get_string("application_name"))
    {
        options.app_name = Some(app_name);
    }
    Ok(())
}

#[async_trait]
impl EngineDriver for MongoDbDriver {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn display_name(&self) -> &'static str {
        "MongoDB"
    }

    fn engine(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    fn validate(&self, config: &ConnectionConfig) -> Result<()> {
        if config.engine != EngineKind::MongoDb {
            return Err(TetherError::Validation(format!(
                "adapter '{}' is configured for {}, not mongodb",
                config.name, config.engine
            )));
        }
        config.validate()?;
        apply_client_options(config, &mut ClientOptions::default())
    }

    #[tracing::instrument(skip(self, config), fields(adapter = %config.name))]
    async fn handshake(&self, config: &ConnectionConfig) -> Result<Arc<dyn EngineSession>> {
        let mut options = ClientOptions::parse(&config.url).await.map_err(|e| {
            TetherError::Engine(format!(
                "failed to parse MongoDB options: {}",
                sanitize_message(&e.to_string())
            ))
        })?;
        apply_client_options(config, &mut options)?;

        let database = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| FALLBACK_DATABASE.to_string());
        tracing::debug!(
            database = %database,
            max_pool_size = ?options.max_pool_size,
            "opening MongoDB client"
        );

        let client = Client::with_options(options).map_err(|e| {
            TetherError::Engine(format!(
                "failed to create MongoDB client: {}",
                sanitize_message(&e.to_string())
            ))
        })?;

        let session = MongoDbSession::new(client, database);
        session.ping().await?;
        tracing::info!("MongoDB connection established");
        Ok(Arc::new(session))
    }
}
