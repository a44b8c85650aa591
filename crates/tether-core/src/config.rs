//! Resolved configuration
//!
//! The core consumes a single [`ResolvedConfig`] value. Loading it from TOML
//! and overlaying environment variables are conveniences for the composition
//! root; nothing in the library reads files or the environment on its own.

use crate::{Result, TetherError, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;


/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TETHER_";

/// Engine family an adapter speaks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "postgres", alias = "postgresql")]
    Postgres,
    #[serde(rename = "mongodb", alias = "mongo")]
    MongoDb,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::MongoDb => "mongodb",
        }
    }

    /// URL schemes accepted for this engine family
    pub fn url_schemes(&self) -> &'static [&'static str] {
        match self {
            EngineKind::Postgres => &["postgres://", "postgresql://"],
            EngineKind::MongoDb => &["mongodb://", "mongodb+srv://"],
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection configuration for one adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service name, unique within a registry
    pub name: String,
    pub engine: EngineKind,
    /// Connection URL; may carry credentials and must never be logged unsanitized
    pub url: String,
    /// Database to use when the URL does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Engine options and pooling hints, forwarded opaquely to the engine driver
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl ConnectionConfig {
    pub fn new(name: &str, engine: EngineKind, url: &str) -> Self {
        Self {
            name: name.to_string(),
            engine,
            url: url.to_string(),
            database: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Get a string parameter. Non-string values are rendered as JSON.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.params.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Get an unsigned integer parameter, accepting numeric strings
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get a boolean parameter, accepting "true"/"false" strings
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.params.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Check the URL scheme matches the engine family
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TetherError::Validation(
                "adapter name must not be empty".to_string(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(TetherError::Validation(format!(
                "adapter '{}' has an empty connection URL",
                self.name
            )));
        }
        let schemes = self.engine.url_schemes();
        if !schemes.iter().any(|scheme| self.url.starts_with(scheme)) {
            return Err(TetherError::Validation(format!(
                "adapter '{}' URL must start with one of {} for engine {}",
                self.name,
                schemes.join(", "),
                self.engine
            )));
        }
        Ok(())
    }
}

/// Retry behavior shared by every adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Name of a registered retry strategy
    pub strategy: String,
    /// Only used by jittered strategies
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            strategy: "exponential".to_string(),
            jitter_factor: 0.1,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub probe_timeout_ms: u64,
    pub interval_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            interval_secs: 30,
        }
    }
}

impl HealthSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Console/file log encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub metrics_enabled: bool,
    pub metrics_max_samples: usize,
    pub metrics_retention_secs: u64,
    pub log_format: LogFormat,
    pub log_filter: String,
    /// Directory for rotated JSON log files; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<std::path::PathBuf>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_max_samples: 10_000,
            metrics_retention_secs: 3600,
            log_format: LogFormat::Pretty,
            log_filter: "info".to_string(),
            log_dir: None,
        }
    }
}

impl ObservabilitySettings {
    pub fn metrics_retention(&self) -> Duration {
        Duration::from_secs(self.metrics_retention_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    pub graceful_timeout_ms: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            graceful_timeout_ms: 10_000,
        }
    }
}

impl ShutdownSettings {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }
}

/// Fully resolved configuration consumed by the subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolvedConfig {
    pub retry: RetrySettings,
    pub adapters: Vec<ConnectionConfig>,
    pub health: HealthSettings,
    pub observability: ObservabilitySettings,
    pub shutdown: ShutdownSettings,
}

impl ResolvedConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TetherError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_toml_str(&contents)
    }

    /// Overlay `TETHER_*` variables onto this configuration.
    ///
    /// Takes the variables as an iterator so callers pass `std::env::vars()`
    /// and tests pass a fixed list. Unknown variables are ignored; malformed
    /// numbers are a `Configuration` error.
    pub fn apply_env_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match key {
                "RETRY_MAX_RETRIES" => self.retry.max_retries = parse_env(key, &value)?,
                "RETRY_DELAY_MS" => self.retry.retry_delay_ms = parse_env(key, &value)?,
                "RETRY_STRATEGY" => self.retry.strategy = value,
                "SHUTDOWN_TIMEOUT_MS" => {
                    self.shutdown.graceful_timeout_ms = parse_env(key, &value)?
                }
                "HEALTH_PROBE_TIMEOUT_MS" => {
                    self.health.probe_timeout_ms = parse_env(key, &value)?
                }
                other => {
                    if let Some(adapter) = other.strip_suffix("_URL")
                        && let Some(config) = self
                            .adapters
                            .iter_mut()
                            .find(|c| env_name(&c.name) == adapter)
                    {
                        tracing::debug!(adapter = %config.name, "connection URL overridden from environment");
                        config.url = value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Fail fast on values the subsystem cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(TetherError::Validation(format!(
                "jitter factor must be within [0, 1], got {}",
                self.retry.jitter_factor
            )));
        }
        if self.retry.strategy.trim().is_empty() {
            return Err(TetherError::Validation(
                "retry strategy name must not be empty".to_string(),
            ));
        }
        if self.observability.metrics_max_samples == 0 {
            return Err(TetherError::Validation(
                "metrics sample cap must be greater than zero".to_string(),
            ));
        }
        if self.health.interval_secs == 0 {
            return Err(TetherError::Validation(
                "health check interval must be at least one second".to_string(),
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(TetherError::Validation(
                "health probe timeout must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for adapter in &self.adapters {
            adapter.validate()?;
            if !seen.insert(adapter.name.as_str()) {
                return Err(TetherError::Validation(format!(
                    "adapter '{}' is configured more than once",
                    adapter.name
                )));
            }
        }
        Ok(())
    }

    pub fn adapter(&self, name: &str) -> Option<&ConnectionConfig> {
        self.adapters.iter().find(|c| c.name == name)
    }
}

/// Environment-variable form of an adapter name: `orders-db` becomes `ORDERS_DB`
pub fn env_name(adapter: &str) -> String {
    adapter
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        TetherError::Configuration(format!("{}{} has invalid value '{}'", ENV_PREFIX, key, value))
    })
}
