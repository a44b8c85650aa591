//! Tether Drivers - engine drivers and adapter construction
//!
//! Re-exports the engine driver crates enabled by features and builds
//! managed adapters for them from a resolved configuration.

#[cfg(feature = "mongodb")]
pub use tether_driver_mongodb as mongodb;
#[cfg(feature = "postgres")]
pub use tether_driver_postgres as postgres;

mod factory;

pub use factory::AdapterFactory;

/// Managed adapter over the PostgreSQL driver
#[cfg(feature = "postgres")]
pub type PostgresAdapter = tether_connection::ManagedAdapter<postgres::PostgresDriver>;

/// Managed adapter over the MongoDB driver
#[cfg(feature = "mongodb")]
pub type MongoDbAdapter = tether_connection::ManagedAdapter<mongodb::MongoDbDriver>;

/// Re-export commonly used types from tether-core
pub use tether_core::{
    ConnectionConfig, DatabaseAdapter, EngineDriver, EngineKind, QueryResult, ResolvedConfig,
    Result, TetherError,
};
