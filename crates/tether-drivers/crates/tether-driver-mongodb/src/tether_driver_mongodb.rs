//! MongoDB engine driver
//!
//! MongoDB is a document store, so "queries" are database commands: the
//! operation string is a JSON command document (or a bare command name) and
//! result rows come from the command's cursor batch or its reply document.
//!
//! Pooling is left to the MongoDB client. Adapter params forward the pool
//! hints `max_pool_size`, `min_pool_size`, `server_selection_timeout_ms`,
//! `connect_timeout_ms` and `app_name` into the client options.

mod command;
mod driver;
#[cfg(test)]
mod driver_tests;
mod session;

pub use command::{parse_command, reply_to_result};
pub use driver::{MongoDbDriver, apply_client_options};
pub use session::MongoDbSession;
