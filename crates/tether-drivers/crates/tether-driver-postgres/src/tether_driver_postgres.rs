//! PostgreSQL engine driver
//!
//! Plugs the relational engine family into the managed adapter: URL parsing
//! and validation, the TLS-aware handshake, and a session that runs
//! parameterized statements and maps rows to JSON values.

mod convert;
mod driver;
#[cfg(test)]
mod driver_tests;
mod session;
mod tls;

pub use driver::{PostgresDriver, build_pg_config};
pub use session::PostgresSession;
pub use tls::{TlsError, build_tls_connector};
