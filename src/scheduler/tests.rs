use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn runs_highest_priority_first() {
    let scheduler = Scheduler::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    // Submit before start() so all three are queued together.
    let low = {
        let order = Arc::clone(&order);
        scheduler.schedule_task(1, "default", move || async move {
            order.lock().unwrap().push("low");
        })
    };
    let high = {
        let order = Arc::clone(&order);
        scheduler.schedule_task(10, "default", move || async move {
            order.lock().unwrap().push("high");
        })
    };
    let mid = {
        let order = Arc::clone(&order);
        scheduler.schedule_task(5, "default", move || async move {
            order.lock().unwrap().push("mid");
        })
    };

    scheduler.start();
    let _ = tokio::join!(low, high, mid);

    assert_eq!(*order.lock().unwrap(), vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn equal_priority_is_fifo() {
    let scheduler = Scheduler::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut futures = Vec::new();
    for i in 0..5 {
        let order = Arc::clone(&order);
        futures.push(scheduler.schedule_task(0, "default", move || async move {
            order.lock().unwrap().push(i);
        }));
    }

    scheduler.start();
    for f in futures {
        f.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn never_exceeds_max_concurrency() {
    let scheduler = Scheduler::new(2);
    let concurrent = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut futures = Vec::new();
    for _ in 0..10 {
        let concurrent = Arc::clone(&concurrent);
        let max_seen = Arc::clone(&max_seen);
        futures.push(scheduler.schedule_task(0, "default", move || async move {
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            concurrent.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    scheduler.start();
    for f in futures {
        f.await.unwrap();
    }

    assert!(max_seen.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn cancel_by_category_completes_queued_tasks_with_error() {
    let scheduler = Scheduler::new(1);

    // Occupy the single slot so queued tasks stay queued.
    let blocker = scheduler.schedule_task(100, "keep", || async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let cancel_me = scheduler.schedule_task(1, "batch-a", || async move {});
    let keep_me = scheduler.schedule_task(1, "batch-b", || async move {});

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let cancelled_count = scheduler.cancel_tasks_by_category("batch-a");
    assert_eq!(cancelled_count, 1);

    let result = cancel_me.await;
    assert!(matches!(result, Err(TaskCancelledError { .. })));

    let _ = blocker.await;
    assert!(keep_me.await.is_ok());
}
