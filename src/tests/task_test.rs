use chrono_tz::Tz;
use pebble_core::task::{Concurrency, TaskFn, TaskManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn blocking_task(active: Arc<AtomicUsize>, peak: Arc<AtomicUsize>, gate: Arc<Notify>) -> TaskFn {
    Arc::new(move |_ctx| {
        let active = active.clone();
        let peak = peak.clone();
        let gate = gate.clone();
        Box::pin(async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            gate.notified().await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

#[tokio::test]
async fn concurrency_limit_caps_simultaneous_runs_across_distinct_tasks() {
    let mgr = TaskManager::new(Tz::UTC, Concurrency::Limited(2));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    for name in ["a", "b", "c", "d"] {
        mgr.add_task(name, "*/1 * * * * *", blocking_task(active.clone(), peak.clone(), gate.clone()))
            .unwrap();
    }

    for name in ["a", "b", "c", "d"] {
        mgr.run_task_now(name).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(peak.load(Ordering::SeqCst), 2);

    gate.notify_waiters();
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn stats_reflect_registered_and_enabled_tasks() {
    let mgr = TaskManager::new(Tz::UTC, Concurrency::Unlimited);
    let noop: TaskFn = Arc::new(|_ctx| Box::pin(async { Ok(()) }));

    mgr.add_task("one", "*/1 * * * * *", noop.clone()).unwrap();
    mgr.add_task("two", "*/1 * * * * *", noop).unwrap();
    mgr.disable("two").unwrap();

    let stats = mgr.get_stats();
    assert_eq!(stats.total_tasks, 2);
    assert_eq!(stats.enabled_tasks, 1);
    assert_eq!(stats.max_concurrency, usize::MAX);
}

#[tokio::test]
async fn remove_task_then_get_task_returns_none() {
    let mgr = TaskManager::new(Tz::UTC, Concurrency::Unlimited);
    let noop: TaskFn = Arc::new(|_ctx| Box::pin(async { Ok(()) }));
    mgr.add_task("gone", "*/1 * * * * *", noop).unwrap();

    mgr.remove_task("gone").unwrap();
    assert!(mgr.get_task("gone").is_none());
    assert!(mgr.remove_task("gone").is_err());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let mgr = TaskManager::new(Tz::UTC, Concurrency::Unlimited);
    let noop: TaskFn = Arc::new(|_ctx| Box::pin(async { Ok(()) }));
    mgr.add_task("dup", "*/1 * * * * *", noop.clone()).unwrap();
    assert!(mgr.add_task("dup", "*/1 * * * * *", noop).is_err());
}
