//! PostgreSQL driver implementation

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    ConnectionConfig, EngineDriver, EngineKind, EngineSession, Result, TetherError,
    sanitize_message,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_postgres::config::SslMode;

use crate::session::{PostgresSession, format_postgres_error};
use crate::tls::build_tls_connector;

/// PostgreSQL engine driver
#[derive(Debug, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_ssl_mode(value: &str) -> Result<SslMode> {
    match value.to_ascii_lowercase().as_str() {
        "disable" => Ok(SslMode::Disable),
        "allow" | "prefer" => Ok(SslMode::Prefer),
        "require" | "verify-ca" | "verify_ca" | "verify-full" | "verify_full" => {
            Ok(SslMode::Require)
        }
        other => Err(TetherError::Validation(format!("unknown ssl_mode '{}'", other))),
    }
}

/// Build a `tokio_postgres::Config` from the URL and adapter params.
///
/// Params override what the URL says: `connect_timeout_ms`,
/// `application_name`, `keepalives` and `ssl_mode`. `database` fills in the
/// database name only when the URL has none.
pub fn build_pg_config(config: &ConnectionConfig) -> Result<tokio_postgres::Config> {
    let mut pg: tokio_postgres::Config = config.url.parse().map_err(|e: tokio_postgres::Error| {
        TetherError::Validation(format!(
            "invalid PostgreSQL URL for '{}': {}",
            config.name,
            sanitize_message(&e.to_string())
        ))
    })?;

    if pg.get_dbname().is_none()
        && let Some(database) = &config.database
    {
        pg.dbname(database.as_str());
    }
    if let Some(ms) = config.get_u64("connect_timeout_ms") {
        pg.connect_timeout(Duration::from_millis(ms));
    }
    if let Some(name) = config.get_string("application_name") {
        pg.application_name(name.as_str());
    }
    if let Some(enabled) = config.get_bool("keepalives") {
        pg.keepalives(enabled);
    }
    if let Some(mode) = config.get_string("ssl_mode") {
        pg.ssl_mode(parse_ssl_mode(&mode)?);
    }

    Ok(pg)
}

/// Drive the connection's I/O until the client is dropped
fn spawn_connection<S, T>(connection: tokio_postgres::Connection<S, T>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %format_postgres_error(&e), "PostgreSQL connection error");
        }
    })
}

fn handshake_error(e: tokio_postgres::Error) -> TetherError {
    TetherError::Engine(format!(
        "failed to connect to PostgreSQL: {}",
        format_postgres_error(&e)
    ))
}

#[async_trait]
impl EngineDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn validate(&self, config: &ConnectionConfig) -> Result<()> {
        if config.engine != EngineKind::Postgres {
            return Err(TetherError::Validation(format!(
                "adapter '{}' is configured for {}, not postgres",
                config.name, config.engine
            )));
        }
        config.validate()?;
        build_pg_config(config).map(|_| ())
    }

    #[tracing::instrument(skip(self, config), fields(adapter = %config.name))]
    async fn handshake(&self, config: &ConnectionConfig) -> Result<Arc<dyn EngineSession>> {
        let pg = build_pg_config(config)?;
        let ssl_mode = pg.get_ssl_mode();
        tracing::debug!(
            hosts = pg.get_hosts().len(),
            database = pg.get_dbname().unwrap_or_default(),
            ssl_mode = ?ssl_mode,
            "opening PostgreSQL connection"
        );

        let (client, task) = if ssl_mode == SslMode::Disable {
            let (client, connection) = pg.connect(NoTls).await.map_err(handshake_error)?;
            (client, spawn_connection(connection))
        } else {
            let tls = build_tls_connector(config)?;
            let (client, connection) = pg.connect(tls).await.map_err(handshake_error)?;
            (client, spawn_connection(connection))
        };

        let session = PostgresSession::new(client, task);
        session.ping().await?;
        tracing::info!("PostgreSQL connection established");
        Ok(Arc::new(session))
    }
}
