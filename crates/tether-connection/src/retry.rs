//! Retry strategies and the retry coordinator
//!
//! A [`RetryStrategy`] decides how long to wait before the next attempt and
//! whether another attempt is allowed at all. The [`RetryCoordinator`] runs an
//! async operation under a strategy, sleeping between failures.
//!
//! # Example
//!
//! ```ignore
//! use tether_connection::retry::{ExponentialBackoff, RetryCoordinator, RetryOptions};
//!
//! let coordinator = RetryCoordinator::new(Arc::new(ExponentialBackoff));
//! let session = coordinator
//!     .execute(|| driver.handshake(&config), RetryOptions::new(3, Duration::from_millis(100)))
//!     .await?;
//! ```

mod coordinator;
mod strategy;

#[cfg(test)]
mod tests;

pub use coordinator::{RetryCoordinator, RetryOptions, RetryOutcome};
pub use strategy::{
    ExponentialBackoff, JitteredBackoff, LinearBackoff, RetryStrategy, StrategyFactory,
    StrategyRegistry,
};
