//! Tether Connection - resilient connection management
//!
//! This crate handles connecting to, monitoring and disconnecting from
//! database engines:
//! - Pluggable retry strategies and a retry coordinator for bootstrap
//! - A managed adapter implementing the uniform adapter contract per engine
//! - Health orchestration and aggregation across adapters
//! - A name-keyed adapter registry
//! - Lifecycle management with signal-driven graceful shutdown

mod adapter;
pub mod health;
pub mod lifecycle;
mod registry;
pub mod retry;

pub use adapter::ManagedAdapter;
pub use health::{
    HealthOrchestrator, HealthSummary, MIN_MONITOR_INTERVAL, SessionHealthCheck, aggregate,
    monitor_interval,
};
pub use lifecycle::{
    ConnectionLifecycle, DisconnectOptions, DisconnectOutcome, register_shutdown_handlers,
    shutdown_all, spawn_shutdown_listener, wait_for_shutdown_signal,
};
pub use registry::AdapterRegistry;
pub use retry::{
    ExponentialBackoff, JitteredBackoff, LinearBackoff, RetryCoordinator, RetryOptions,
    RetryOutcome, RetryStrategy, StrategyFactory, StrategyRegistry,
};
