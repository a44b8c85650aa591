//! Health checking for adapters
//!
//! [`SessionHealthCheck`] probes one live engine session with a timeout.
//! [`HealthOrchestrator`] fans checks out across many adapters and folds the
//! reports into one [`AggregatedStatus`](tether_core::AggregatedStatus).
//!
//! # Example
//!
//! ```ignore
//! use tether_connection::health::HealthOrchestrator;
//!
//! let orchestrator = HealthOrchestrator::new(vec![postgres, mongodb]);
//! let reports = orchestrator.check_all().await;
//! let status = orchestrator.aggregated_status().await;
//! ```

mod orchestrator;
mod probe;

#[cfg(test)]
mod tests;

pub use orchestrator::{
    HealthOrchestrator, HealthSummary, MIN_MONITOR_INTERVAL, aggregate, monitor_interval,
};
pub use probe::SessionHealthCheck;
