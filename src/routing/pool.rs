//! Bounded per-service client pool with a wait-queue (C10 pool).

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, oneshot};

/// Errors raised by [`ServiceClientPool`].
#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    /// `get_service`/`release_service` referenced a service with no
    /// registered factory.
    #[error("unknown service: {0}")]
    UnknownService(String),
    /// A wait-queued request was not served within its timeout.
    #[error("timed out waiting for a pooled client")]
    Timeout,
}

type Factory<T> = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = T> + Send>> + Send + Sync>;

struct PerService<T> {
    factory: Factory<T>,
    in_use: usize,
    idle: Vec<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
}

/// Bounds the number of simultaneously-live client instances per service id.
///
/// `get_service` returns an idle instance if one exists, creates a fresh one
/// if under `max_pool_size`, or enqueues behind existing waiters up to an
/// optional timeout. `release_service` hands a returned instance directly to
/// the oldest waiter if one exists, otherwise returns it to the idle set
/// (spec §4.10).
pub struct ServiceClientPool<T: Send + 'static> {
    max_pool_size: usize,
    services: Mutex<HashMap<String, PerService<T>>>,
}

enum Action<T> {
    Ready(T),
    Create(Factory<T>),
    Wait(oneshot::Receiver<T>),
}

impl<T: Send + 'static> ServiceClientPool<T> {
    /// Creates a pool capping every registered service at `max_pool_size`
    /// simultaneously in-use-or-idle instances.
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            max_pool_size: max_pool_size.max(1),
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) `service_id`'s factory. Factories must
    /// produce a ready-to-use client (spec §4.10).
    pub async fn register_factory<F, Fut>(&self, service_id: impl Into<String>, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let factory: Factory<T> = Arc::new(move || Box::pin(factory()));
        let mut services = self.services.lock().await;
        services
            .entry(service_id.into())
            .and_modify(|state| state.factory = Arc::clone(&factory))
            .or_insert_with(|| PerService {
                factory,
                in_use: 0,
                idle: Vec::new(),
                waiters: VecDeque::new(),
            });
    }

    /// Returns a client for `service_id`, creating one if the pool has
    /// headroom or waiting (up to `timeout`, if given) for one to free up.
    pub async fn get_service(&self, service_id: &str, timeout: Option<Duration>) -> Result<T, PoolError> {
        let action = {
            let mut services = self.services.lock().await;
            let state = services
                .get_mut(service_id)
                .ok_or_else(|| PoolError::UnknownService(service_id.to_string()))?;

            if let Some(client) = state.idle.pop() {
                state.in_use += 1;
                Action::Ready(client)
            } else if state.in_use + state.idle.len() < self.max_pool_size {
                state.in_use += 1;
                Action::Create(Arc::clone(&state.factory))
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Action::Wait(rx)
            }
        };

        match action {
            Action::Ready(client) => Ok(client),
            Action::Create(factory) => Ok(factory().await),
            Action::Wait(rx) => match timeout {
                Some(d) => tokio::time::timeout(d, rx)
                    .await
                    .map_err(|_| PoolError::Timeout)?
                    .map_err(|_| PoolError::Timeout),
                None => rx.await.map_err(|_| PoolError::Timeout),
            },
        }
    }

    /// Returns `client` to `service_id`'s pool: handed directly to the
    /// oldest live waiter if one exists (falling through to the next if a
    /// waiter's receiver was already dropped by a timed-out `get_service`),
    /// otherwise pushed onto the idle set.
    pub async fn release_service(&self, service_id: &str, client: T) {
        let mut services = self.services.lock().await;
        let Some(state) = services.get_mut(service_id) else {
            return;
        };

        let mut client = client;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(client) {
                Ok(()) => return,
                Err(rejected) => client = rejected,
            }
        }

        state.in_use = state.in_use.saturating_sub(1);
        state.idle.push(client);
    }

    /// Number of instances of `service_id` currently checked out.
    pub async fn in_use_count(&self, service_id: &str) -> usize {
        self.services.lock().await.get(service_id).map(|s| s.in_use).unwrap_or(0)
    }

    /// Number of idle instances of `service_id` available for reuse.
    pub async fn idle_count(&self, service_id: &str) -> usize {
        self.services.lock().await.get(service_id).map(|s| s.idle.len()).unwrap_or(0)
    }
}
