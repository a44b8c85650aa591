//! Tether Monitor - in-memory metrics for the connection subsystem
//!
//! This crate records:
//! - Query samples (operation, duration, outcome)
//! - Connection attempts and their lifetimes
//! - Point-in-time snapshots aggregated over a retention window

pub mod metrics;

pub use metrics::*;
