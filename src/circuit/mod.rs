//! Per-endpoint circuit breaker with closed/open/half-open state machine (C7).

#[cfg(test)]
mod tests;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tracing::info;

/// Errors raised directly by the circuit breaker (as opposed to the wrapped
/// call's own error, which is passed through unmodified by [`CircuitBreaker::call`]).
#[derive(Debug, Error, PartialEq)]
pub enum CircuitBreakerError<E: std::error::Error> {
    /// The breaker is open; the wrapped function was not invoked.
    #[error("circuit is open")]
    CircuitOpen,
    /// The wrapped function's own error, passed through.
    #[error(transparent)]
    Inner(#[from] E),
}

/// Circuit breaker state (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures accumulate toward `failure_threshold`.
    Closed,
    /// Calls are rejected immediately until `reset_timeout` elapses.
    Open,
    /// A trial window: successes accumulate toward `half_open_success_threshold`,
    /// any failure reopens immediately.
    HalfOpen,
}

/// Breaker tuning (spec §4.7 / §6 `CircuitBreakerSettings`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures required to trip from closed to open.
    pub failure_threshold: u32,
    /// Time open before transitioning to half-open.
    pub reset_timeout: Duration,
    /// Time a half-open trial window stays open before reverting to open.
    pub half_open_timeout: Duration,
    /// Consecutive successes required to close from half-open.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_timeout: Duration::from_secs(10),
            half_open_success_threshold: 2,
        }
    }
}

impl From<crate::config::CircuitBreakerConfig> for CircuitBreakerSettings {
    fn from(c: crate::config::CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: c.failure_threshold,
            reset_timeout: c.reset_timeout,
            half_open_timeout: c.half_open_timeout,
            half_open_success_threshold: c.half_open_success_threshold,
        }
    }
}

/// Snapshot of the breaker's internal counters, for observability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerStatus {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded in the current closed/half-open window.
    pub failure_count: u32,
    /// Consecutive successes recorded in the current half-open window.
    pub success_count: u32,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_state_change: Instant,
}

/// A callback invoked after every state transition with `(from, to)`.
pub type TransitionCallback = Box<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

/// Failure gate guarding calls to a single endpoint.
///
/// `half_open_timeout` is enforced lazily: [`CircuitBreaker::allow`] checks it
/// whenever the breaker is consulted, reverting to `Open` if a half-open
/// trial has run too long without enough successes to close.
pub struct CircuitBreaker {
    settings: CircuitBreakerSettings,
    inner: Mutex<Inner>,
    callbacks: Mutex<Vec<TransitionCallback>>,
}

impl CircuitBreaker {
    /// Creates a new breaker, starting `Closed`.
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_state_change: Instant::now(),
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback fired after every transition.
    pub fn on_transition<F>(&self, callback: F)
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.callbacks.lock().expect("lock poisoned").push(Box::new(callback));
    }

    /// Returns a snapshot of the current state and counters.
    pub fn status(&self) -> CircuitBreakerStatus {
        let mut inner = self.inner.lock().expect("lock poisoned");
        self.reconcile_timers(&mut inner);
        CircuitBreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }

    /// `true` if a call would currently be allowed through.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        self.reconcile_timers(&mut inner);
        inner.state != CircuitState::Open
    }

    /// Consults the breaker then, if allowed, awaits `f` and records the
    /// outcome. Returns [`CircuitBreakerError::CircuitOpen`] without calling
    /// `f` if the breaker is open.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        E: std::error::Error,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Wraps a stream so each delivered `Ok` item counts as a success and
    /// each `Err` counts as a failure. The breaker's allow-state is consulted
    /// only once, at subscription time (spec §4.7).
    pub fn guard_stream<S, T, E>(
        self: &std::sync::Arc<Self>,
        stream: S,
    ) -> impl Stream<Item = Result<T, CircuitBreakerError<E>>>
    where
        S: Stream<Item = Result<T, E>>,
        E: std::error::Error,
    {
        let breaker = std::sync::Arc::clone(self);
        let open = !self.allow();
        stream.map(move |item| {
            if open {
                return Err(CircuitBreakerError::CircuitOpen);
            }
            match item {
                Ok(value) => {
                    breaker.record_success();
                    Ok(value)
                }
                Err(err) => {
                    breaker.record_failure();
                    Err(CircuitBreakerError::Inner(err))
                }
            }
        })
    }

    /// Records a successful call outcome, advancing half-open → closed once
    /// the success threshold is met.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        self.reconcile_timers(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.settings.half_open_success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed call outcome, tripping closed → open at threshold and
    /// reopening immediately from half-open.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        self.reconcile_timers(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.settings.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Advances `Open → HalfOpen` after `reset_timeout`, and reverts a
    /// half-open trial that has run past `half_open_timeout` without closing.
    fn reconcile_timers(&self, inner: &mut Inner) {
        let elapsed = inner.last_state_change.elapsed();
        match inner.state {
            CircuitState::Open if elapsed >= self.settings.reset_timeout => {
                self.transition(inner, CircuitState::HalfOpen);
                inner.success_count = 0;
            }
            CircuitState::HalfOpen if elapsed >= self.settings.half_open_timeout => {
                self.transition(inner, CircuitState::Open);
                inner.success_count = 0;
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.last_state_change = Instant::now();
        info!(?from, ?to, "circuit breaker state transition");

        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                callback(from, to);
            }
        }
    }
}
