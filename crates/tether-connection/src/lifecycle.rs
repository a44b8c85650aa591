//! Connection lifecycle management
//!
//! [`ConnectionLifecycle`] is the facade an adapter's consumer holds: it
//! guards single initialization and bounds the wait on disconnect. The
//! [`shutdown`] helpers wire OS signals to a graceful disconnect of every
//! managed adapter, once per process.

mod manager;
pub mod shutdown;


pub use manager::{ConnectionLifecycle, DisconnectOptions, DisconnectOutcome};
pub use shutdown::{
    register_shutdown_handlers, shutdown_all, spawn_shutdown_listener, wait_for_shutdown_signal,
};
