//! Backoff strategies
//!
//! All strategies are stateless policy values. `calculate_delay` is a pure
//! function of `(attempt, base_delay)`; the jittered variant adds a bounded
//! random perturbation on top.

use parking_lot::RwLock;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Result, RetrySettings, TetherError};

/// Delay calculation and retry predicate used by the retry coordinator
pub trait RetryStrategy: Send + Sync + std::fmt::Debug {
    /// Strategy name as registered (e.g., "exponential")
    fn name(&self) -> &'static str;

    /// Delay before the attempt following the 0-indexed `attempt`
    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration;

    /// Whether another attempt may be made after `attempt` failed.
    ///
    /// The error is available to strategies that classify failures; the
    /// default is purely count-based.
    fn should_retry(
        &self,
        attempt: u32,
        max_retries: u32,
        _error: &(dyn std::error::Error + 'static),
    ) -> bool {
        attempt < max_retries
    }
}

fn exponential_delay(attempt: u32, base_delay: Duration) -> Duration {
    let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base_delay.saturating_mul(multiplier)
}

/// `delay = base_delay * 2^attempt`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &'static str {
        "exponential"
    }

    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        exponential_delay(attempt, base_delay)
    }
}

/// `delay = base_delay * (attempt + 1)`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBackoff;

impl RetryStrategy for LinearBackoff {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

/// Exponential backoff plus `uniform(0, exponential_delay * jitter_factor)`.
///
/// Spreads out retries from many clients that failed at the same moment.
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    jitter_factor: f64,
}

impl JitteredBackoff {
    /// Fails with a validation error unless `jitter_factor` is within `[0, 1]`
    pub fn new(jitter_factor: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&jitter_factor) {
            return Err(TetherError::Validation(format!(
                "jitter factor must be within [0, 1], got {}",
                jitter_factor
            )));
        }
        Ok(Self { jitter_factor })
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }
}

impl RetryStrategy for JitteredBackoff {
    fn name(&self) -> &'static str {
        "exponential-jitter"
    }

    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        let delay = exponential_delay(attempt, base_delay);
        let max_jitter = delay.as_secs_f64() * self.jitter_factor;
        if max_jitter <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=max_jitter);
        delay.saturating_add(Duration::try_from_secs_f64(jitter).unwrap_or(Duration::ZERO))
    }
}

fn build_exponential(_: &RetrySettings) -> Result<Arc<dyn RetryStrategy>> {
    Ok(Arc::new(ExponentialBackoff))
}

fn build_linear(_: &RetrySettings) -> Result<Arc<dyn RetryStrategy>> {
    Ok(Arc::new(LinearBackoff))
}

fn build_jittered(settings: &RetrySettings) -> Result<Arc<dyn RetryStrategy>> {
    Ok(Arc::new(JitteredBackoff::new(settings.jitter_factor)?))
}

/// Builds a strategy from retry settings
pub type StrategyFactory =
    Arc<dyn Fn(&RetrySettings) -> Result<Arc<dyn RetryStrategy>> + Send + Sync>;

/// Name-keyed set of strategy factories.
///
/// Ships with `exponential`, `linear` and `exponential-jitter` (alias
/// `jitter`). Callers such as migration tooling register their own.
pub struct StrategyRegistry {
    factories: RwLock<BTreeMap<String, StrategyFactory>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry holding the built-in strategies
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        {
            let mut factories = registry.factories.write();
            let jittered: StrategyFactory = Arc::new(build_jittered);
            factories.insert("exponential".to_string(), Arc::new(build_exponential));
            factories.insert("linear".to_string(), Arc::new(build_linear));
            factories.insert("exponential-jitter".to_string(), jittered.clone());
            factories.insert("jitter".to_string(), jittered);
        }
        registry
    }

    /// Register a custom strategy. Names are unique.
    pub fn register(&self, name: &str, factory: StrategyFactory) -> Result<()> {
        let mut factories = self.factories.write();
        if factories.contains_key(name) {
            return Err(TetherError::RegistryConflict(name.to_string()));
        }
        tracing::debug!(strategy = %name, "registered retry strategy");
        factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Build the strategy named by `settings.strategy`
    pub fn build(&self, settings: &RetrySettings) -> Result<Arc<dyn RetryStrategy>> {
        let factory = self
            .factories
            .read()
            .get(&settings.strategy)
            .cloned()
            .ok_or_else(|| {
                TetherError::Validation(format!("unknown retry strategy '{}'", settings.strategy))
            })?;
        factory(settings)
    }
}
