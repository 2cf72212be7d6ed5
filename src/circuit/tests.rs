use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> CircuitBreakerSettings {
    CircuitBreakerSettings {
        failure_threshold: 2,
        reset_timeout: Duration::from_millis(50),
        half_open_timeout: Duration::from_secs(10),
        half_open_success_threshold: 1,
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("boom")]
struct Boom;

#[tokio::test]
async fn trips_open_after_threshold_and_rejects_without_calling() {
    let breaker = CircuitBreaker::new(settings());
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let calls = Arc::clone(&calls);
        let result = breaker
            .call(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), Boom>(Boom)
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner(Boom))));
    }

    assert_eq!(breaker.status().state, CircuitState::Open);

    let calls2 = Arc::clone(&calls);
    let result = breaker
        .call(|| async move {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok::<(), Boom>(())
        })
        .await;
    assert_eq!(result, Err(CircuitBreakerError::CircuitOpen));
    assert_eq!(calls.load(Ordering::SeqCst), 2, "wrapped fn must not run while open");
}

#[tokio::test]
async fn half_open_success_closes_and_resets_counters() {
    let breaker = CircuitBreaker::new(settings());
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.status().state, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(70)).await;
    assert_eq!(breaker.status().state, CircuitState::HalfOpen);

    breaker.record_success();
    let status = breaker.status();
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failure_count, 0);
}

#[tokio::test]
async fn half_open_failure_reopens_immediately() {
    let breaker = CircuitBreaker::new(settings());
    breaker.record_failure();
    breaker.record_failure();
    tokio::time::sleep(Duration::from_millis(70)).await;
    assert_eq!(breaker.status().state, CircuitState::HalfOpen);

    breaker.record_failure();
    assert_eq!(breaker.status().state, CircuitState::Open);
}

#[tokio::test]
async fn transition_callbacks_fire_in_order() {
    let breaker = CircuitBreaker::new(settings());
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    breaker.on_transition(move |from, to| seen2.lock().unwrap().push((from, to)));

    breaker.record_failure();
    breaker.record_failure();

    let log = seen.lock().unwrap();
    assert_eq!(*log, vec![(CircuitState::Closed, CircuitState::Open)]);
}

#[test]
fn closed_success_resets_failure_count() {
    let breaker = CircuitBreaker::new(settings());
    breaker.record_failure();
    breaker.record_success();
    assert_eq!(breaker.status().failure_count, 0);
    assert_eq!(breaker.status().state, CircuitState::Closed);
}
