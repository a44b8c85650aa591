//! Tests for retry strategies and the retry coordinator

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tether_core::{RetrySettings, TetherError};

fn engine_error(message: &str) -> TetherError {
    TetherError::Engine(message.to_string())
}

mod strategy_tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let strategy = ExponentialBackoff;
        let base = Duration::from_millis(100);
        for attempt in 0..=10u32 {
            assert_eq!(
                strategy.calculate_delay(attempt, base),
                base * 2u32.pow(attempt),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn test_linear_delays() {
        let strategy = LinearBackoff;
        let base = Duration::from_millis(100);
        for attempt in 0..=10u32 {
            assert_eq!(strategy.calculate_delay(attempt, base), base * (attempt + 1));
        }
    }

    #[test]
    fn test_exponential_saturates_instead_of_overflowing() {
        let delay = ExponentialBackoff.calculate_delay(64, Duration::from_secs(1));
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let strategy = JitteredBackoff::new(0.5).unwrap();
        let base = Duration::from_millis(100);
        for attempt in 0..=10u32 {
            let exponential = base * 2u32.pow(attempt);
            for _ in 0..20 {
                let delay = strategy.calculate_delay(attempt, base);
                assert!(delay >= exponential, "attempt {attempt}: {delay:?}");
                assert!(
                    delay <= exponential + exponential.mul_f64(0.5),
                    "attempt {attempt}: {delay:?}"
                );
            }
        }
    }

    #[test]
    fn test_zero_jitter_is_exponential() {
        let strategy = JitteredBackoff::new(0.0).unwrap();
        assert_eq!(
            strategy.calculate_delay(3, Duration::from_millis(10)),
            Duration::from_millis(80)
        );
    }

    #[test]
    fn test_jitter_factor_out_of_range_fails_at_construction() {
        assert!(matches!(
            JitteredBackoff::new(1.5),
            Err(TetherError::Validation(_))
        ));
        assert!(matches!(
            JitteredBackoff::new(-0.1),
            Err(TetherError::Validation(_))
        ));
        assert!(JitteredBackoff::new(1.0).is_ok());
    }

    #[test]
    fn test_should_retry_is_count_based() {
        let error = engine_error("boom");
        for strategy in [
            Arc::new(ExponentialBackoff) as Arc<dyn RetryStrategy>,
            Arc::new(LinearBackoff),
            Arc::new(JitteredBackoff::new(0.1).unwrap()),
        ] {
            assert!(strategy.should_retry(0, 3, &error));
            assert!(strategy.should_retry(2, 3, &error));
            assert!(!strategy.should_retry(3, 3, &error));
            assert!(!strategy.should_retry(0, 0, &error));
        }
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn test_builtin_strategies() {
        let registry = StrategyRegistry::with_defaults();
        let mut settings = RetrySettings::default();
        for (name, expected) in [
            ("exponential", "exponential"),
            ("linear", "linear"),
            ("exponential-jitter", "exponential-jitter"),
            ("jitter", "exponential-jitter"),
        ] {
            settings.strategy = name.to_string();
            assert_eq!(registry.build(&settings).unwrap().name(), expected);
        }
    }

    #[test]
    fn test_unknown_strategy_is_validation_error() {
        let registry = StrategyRegistry::with_defaults();
        let settings = RetrySettings {
            strategy: "fibonacci".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            registry.build(&settings),
            Err(TetherError::Validation(_))
        ));
    }

    #[test]
    fn test_jitter_factor_validated_on_build() {
        let registry = StrategyRegistry::with_defaults();
        let settings = RetrySettings {
            strategy: "exponential-jitter".to_string(),
            jitter_factor: 2.0,
            ..Default::default()
        };
        assert!(registry.build(&settings).is_err());
    }

    #[test]
    fn test_register_custom_and_conflict() {
        let registry = StrategyRegistry::with_defaults();
        fn flat(_: &RetrySettings) -> tether_core::Result<Arc<dyn RetryStrategy>> {
            Ok(Arc::new(LinearBackoff))
        }

        registry.register("flat", Arc::new(flat)).unwrap();
        assert!(registry.contains("flat"));

        let err = registry.register("linear", Arc::new(flat)).unwrap_err();
        assert!(matches!(err, TetherError::RegistryConflict(name) if name == "linear"));
    }
}

mod coordinator_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_without_delay() {
        let coordinator = RetryCoordinator::default();
        let started = tokio::time::Instant::now();

        let result: Result<u32, TetherError> = coordinator
            .execute(|| async { Ok(7) }, RetryOptions::default())
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_invokes_operation_max_retries_plus_one_times() {
        let coordinator = RetryCoordinator::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TetherError> = coordinator
            .execute(
                move || {
                    let counter = counter.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        Err(engine_error(&format!("failure {n}")))
                    }
                },
                RetryOptions::new(3, Duration::from_millis(10)),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Final error surfaces unchanged
        assert_eq!(result.unwrap_err().to_string(), "Engine error: failure 3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once_without_delay() {
        let coordinator = RetryCoordinator::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<(), TetherError> = coordinator
            .execute(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(engine_error("down")) }
                },
                RetryOptions::new(0, Duration::from_secs(1)),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_sees_attempts_and_delays() {
        let coordinator = RetryCoordinator::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = seen.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let options = RetryOptions::new(3, Duration::from_millis(100)).with_on_retry(
            move |outcome: &RetryOutcome<'_, TetherError>| {
                hook_seen
                    .lock()
                    .push((outcome.attempt, outcome.delay, outcome.error.to_string()));
            },
        );
        let result = coordinator
            .execute(
                move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(engine_error("refused"))
                        } else {
                            Ok("connected")
                        }
                    }
                },
                options,
            )
            .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(
            *seen.lock(),
            vec![
                (1, Duration::from_millis(100), "Engine error: refused".to_string()),
                (2, Duration::from_millis(200), "Engine error: refused".to_string()),
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_strategy_applies_to_next_call() {
        let coordinator = RetryCoordinator::default();
        coordinator.set_strategy(Arc::new(LinearBackoff));
        assert_eq!(coordinator.strategy().name(), "linear");

        let delays = Arc::new(Mutex::new(Vec::new()));
        let hook_delays = delays.clone();
        let options = RetryOptions::new(2, Duration::from_millis(100)).with_on_retry(
            move |outcome: &RetryOutcome<'_, TetherError>| hook_delays.lock().push(outcome.delay),
        );
        let _ = coordinator
            .execute(|| async { Err::<(), _>(engine_error("x")) }, options)
            .await;

        assert_eq!(
            *delays.lock(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }
}
