//! TLS connector for PostgreSQL handshakes

use native_tls::{Certificate, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use tether_core::{ConnectionConfig, TetherError};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CA certificate format: {0}")]
    InvalidCaCert(String),

    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),
}

impl From<TlsError> for TetherError {
    fn from(error: TlsError) -> Self {
        match error {
            TlsError::CaCertLoadFailed { .. } | TlsError::InvalidCaCert(_) => {
                TetherError::Validation(error.to_string())
            }
            TlsError::ConfigurationError(_) => TetherError::Engine(error.to_string()),
        }
    }
}

/// Build the connector used for every sslmode other than `disable`.
///
/// Reads `ssl_root_cert` (PEM path) and `ssl_accept_invalid_certs` from the
/// adapter params.
pub fn build_tls_connector(config: &ConnectionConfig) -> Result<MakeTlsConnector, TlsError> {
    let mut builder = TlsConnector::builder();

    if let Some(path) = config.get_string("ssl_root_cert").filter(|p| !p.is_empty()) {
        tracing::debug!(path = %path, "loading CA certificate");
        let pem = fs::read(&path).map_err(|source| TlsError::CaCertLoadFailed {
            path: path.clone(),
            source,
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidCaCert(e.to_string()))?;
        builder.add_root_certificate(cert);
    }

    if config.get_bool("ssl_accept_invalid_certs").unwrap_or(false) {
        tracing::warn!(adapter = %config.name, "TLS certificate verification disabled");
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }

    let connector = builder
        .build()
        .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;
    Ok(MakeTlsConnector::new(connector))
}
