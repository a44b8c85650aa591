//! Metrics module
//!
//! Bounded, retention-windowed sample buffers with on-demand aggregation.

mod collector;

#[cfg(test)]
mod tests;

pub use collector::*;
