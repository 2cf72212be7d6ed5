//! Priority task scheduler with a max-concurrency gate (C8).

#[cfg(test)]
mod tests;

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{Notify, Semaphore, oneshot};
use tracing::debug;

/// Raised when a queued (not yet started) task is cancelled via
/// [`Scheduler::cancel_tasks_by_category`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("task cancelled (category: {category})")]
pub struct TaskCancelledError {
    /// The category the cancelled task belonged to.
    pub category: String,
}

/// Outcome of a scheduled task: either its own result or cancellation.
pub type ScheduledResult<T> = Result<T, TaskCancelledError>;

/// A single run function; resolves the task's completer when invoked.
/// `None` once consumed either by execution or by cancellation.
type RunFn = Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send>;
type CancelFn = Box<dyn FnOnce(TaskCancelledError) + Send>;

struct QueuedTask {
    priority: i64,
    sequence: u64,
    category: String,
    run: Option<RunFn>,
    cancel: Option<CancelFn>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// Max-heap by priority; ties broken FIFO (earlier sequence compares
    /// greater, so `BinaryHeap::pop` returns the earliest-submitted first).
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority max-heap gated by `max_concurrency` in-flight tasks.
///
/// `schedule_task` enqueues work and returns a future immediately; call
/// [`Scheduler::start`] once to begin draining the queue. Equal-priority
/// tasks run FIFO (spec §4.8, §5 ordering guarantees).
pub struct Scheduler {
    queue: Mutex<BinaryHeap<QueuedTask>>,
    semaphore: Arc<Semaphore>,
    sequence: AtomicU64,
    notify: Notify,
    in_flight: AtomicU64,
}

impl Scheduler {
    /// Creates a scheduler allowing up to `max_concurrency` tasks in flight.
    pub fn new(max_concurrency: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(BinaryHeap::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            sequence: AtomicU64::new(0),
            notify: Notify::new(),
            in_flight: AtomicU64::new(0),
        })
    }

    /// Number of tasks currently executing (never exceeds `max_concurrency`).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst) as usize
    }

    /// Number of tasks waiting to be picked.
    pub fn queued(&self) -> usize {
        self.queue.lock().expect("lock poisoned").len()
    }

    /// Enqueues `task` at `priority` (higher runs first) under `category`,
    /// returning a future that resolves with the task's output, or with
    /// [`TaskCancelledError`] if cancelled by category before it starts.
    pub fn schedule_task<T, F, Fut>(
        self: &Arc<Self>,
        priority: i64,
        category: impl Into<String>,
        task: F,
    ) -> impl std::future::Future<Output = ScheduledResult<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<ScheduledResult<T>>();
        let sender = Arc::new(Mutex::new(Some(tx)));
        let category = category.into();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let run_sender = Arc::clone(&sender);
        let run: RunFn = Box::new(move || {
            Box::pin(async move {
                let value = task().await;
                if let Some(tx) = run_sender.lock().expect("lock poisoned").take() {
                    let _ = tx.send(Ok(value));
                }
            })
        });

        let cancel_sender = Arc::clone(&sender);
        let cancel: CancelFn = Box::new(move |error| {
            if let Some(tx) = cancel_sender.lock().expect("lock poisoned").take() {
                let _ = tx.send(Err(error));
            }
        });

        {
            let mut queue = self.queue.lock().expect("lock poisoned");
            queue.push(QueuedTask {
                priority,
                sequence,
                category,
                run: Some(run),
                cancel: Some(cancel),
            });
        }
        self.notify.notify_one();

        async move {
            rx.await.unwrap_or(Err(TaskCancelledError {
                category: String::new(),
            }))
        }
    }

    /// Begins draining the queue in the background.
    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let next = {
                    let mut queue = scheduler.queue.lock().expect("lock poisoned");
                    queue.pop()
                };

                let Some(mut task) = next else {
                    scheduler.notify.notified().await;
                    continue;
                };

                let Some(run) = task.run.take() else { continue };
                task.cancel = None;

                let permit = Arc::clone(&scheduler.semaphore)
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");

                scheduler.in_flight.fetch_add(1, Ordering::SeqCst);
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    run().await;
                    drop(permit);
                    scheduler.in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
    }

    /// Completes every *queued* (not yet running) task of `category` with
    /// [`TaskCancelledError`]. In-flight tasks are unaffected.
    pub fn cancel_tasks_by_category(&self, category: &str) -> usize {
        let mut queue = self.queue.lock().expect("lock poisoned");
        let (keep, cancelled): (Vec<_>, Vec<_>) = std::mem::take(&mut *queue)
            .into_vec()
            .into_iter()
            .partition(|t| t.category != category);

        *queue = BinaryHeap::from(keep);
        let count = cancelled.len();

        for mut task in cancelled {
            if let Some(cancel) = task.cancel.take() {
                cancel(TaskCancelledError {
                    category: category.to_string(),
                });
            }
        }

        if count > 0 {
            debug!(category, count, "cancelled queued tasks by category");
        }
        count
    }
}
