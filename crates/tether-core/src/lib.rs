//! Tether Core - Core abstractions for the connection resilience layer
//!
//! This crate provides the fundamental traits and types that all other
//! tether crates depend on. It defines:
//!
//! - `DatabaseAdapter` - The uniform lifecycle contract every engine family exposes
//! - `EngineDriver` / `EngineSession` - Engine-specific handshake and live session
//! - `TetherError` - The classified error taxonomy
//! - `ResolvedConfig` - The fully resolved configuration value
//! - `HealthReport` - The wire-visible health report shape

mod adapter;
mod command;
pub mod config;
mod error;
mod health;
mod types;

pub use adapter::*;
pub use command::*;
pub use config::{
    ConnectionConfig, EngineKind, HealthSettings, LogFormat, ObservabilitySettings,
    ResolvedConfig, RetrySettings, ShutdownSettings,
};
pub use error::*;
pub use health::*;
pub use types::*;
