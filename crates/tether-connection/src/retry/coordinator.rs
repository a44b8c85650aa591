//! Execute-with-retry driver

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{ExponentialBackoff, RetryStrategy};

/// Per-retry record handed to the `on_retry` hook
#[derive(Debug)]
pub struct RetryOutcome<'a, E> {
    /// 1-indexed number of the retry about to happen
    pub attempt: u32,
    /// The failure that triggered this retry
    pub error: &'a E,
    /// How long the coordinator will sleep before retrying
    pub delay: Duration,
}

type RetryHook<E> = Box<dyn Fn(&RetryOutcome<'_, E>) + Send + Sync>;

/// Options for a single `execute` call
pub struct RetryOptions<E> {
    max_retries: u32,
    base_delay: Duration,
    on_retry: Option<RetryHook<E>>,
}

impl<E> std::fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl<E> RetryOptions<E> {
    /// `max_retries` counts retries, so the operation runs at most `max_retries + 1` times
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            on_retry: None,
        }
    }

    /// Hook invoked before each backoff sleep. Panics in the hook are not caught.
    pub fn with_on_retry(
        mut self,
        on_retry: impl Fn(&RetryOutcome<'_, E>) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(on_retry));
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Runs async operations under a swappable retry strategy.
///
/// Stateless across calls apart from the strategy itself. There is no
/// overall deadline; callers wrap `execute` in a timeout when they need one.
#[derive(Debug)]
pub struct RetryCoordinator {
    strategy: RwLock<Arc<dyn RetryStrategy>>,
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(ExponentialBackoff))
    }
}

impl RetryCoordinator {
    pub fn new(strategy: Arc<dyn RetryStrategy>) -> Self {
        Self {
            strategy: RwLock::new(strategy),
        }
    }

    /// Replace the strategy. Calls already in flight keep the old one.
    pub fn set_strategy(&self, strategy: Arc<dyn RetryStrategy>) {
        tracing::debug!(strategy = strategy.name(), "retry strategy replaced");
        *self.strategy.write() = strategy;
    }

    pub fn strategy(&self) -> Arc<dyn RetryStrategy> {
        self.strategy.read().clone()
    }

    /// Invoke `operation` until it succeeds or the strategy refuses another attempt.
    ///
    /// Success returns immediately with no trailing delay. The final error is
    /// returned unchanged.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: RetryOptions<E>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let strategy = self.strategy();
        let mut attempt = 0u32;

        loop {
            let delay = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !strategy.should_retry(attempt, options.max_retries, &error) {
                        return Err(error);
                    }
                    let delay = strategy.calculate_delay(attempt, options.base_delay);
                    if let Some(on_retry) = &options.on_retry {
                        on_retry(&RetryOutcome {
                            attempt: attempt + 1,
                            error: &error,
                            delay,
                        });
                    }
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
