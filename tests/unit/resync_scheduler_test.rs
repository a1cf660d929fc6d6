//! Unit tests for the resync scheduler and the retry timer.
//!
//! The scheduler must keep at most one refetch in flight, hand every
//! concurrent caller the same in-flight future, and drop non-forced
//! requests inside the cooldown window. The retry timer must stay
//! single-flight. All tests run on a paused clock for determinism.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bmarks::services::resync_scheduler::{ResyncScheduler, RetryTimer};

const COOLDOWN: Duration = Duration::from_millis(1500);

#[tokio::test(start_paused = true)]
async fn test_rapid_requests_trigger_at_most_one_refetch() {
    let scheduler = ResyncScheduler::new(COOLDOWN);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        if let Some(handle) = scheduler.request(false, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }) {
            handles.push(handle);
        }
    }

    for handle in handles {
        handle.await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_the_inflight_future() {
    let scheduler = ResyncScheduler::new(COOLDOWN);

    let first = scheduler
        .request(false, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        })
        .expect("first request admitted");
    let second = scheduler
        .request(false, async {})
        .expect("second request returns the in-flight future");

    assert!(first.ptr_eq(&second));
    first.await;
}

#[tokio::test(start_paused = true)]
async fn test_nonforced_request_inside_cooldown_is_dropped() {
    let scheduler = ResyncScheduler::new(COOLDOWN);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_a = Arc::clone(&counter);
    let handle = scheduler
        .request(false, async move {
            counter_a.fetch_add(1, Ordering::SeqCst);
        })
        .expect("admitted");
    handle.await;
    assert!(scheduler.is_idle());

    // Inside the cooldown window: dropped entirely.
    let counter_b = Arc::clone(&counter);
    let dropped = scheduler.request(false, async move {
        counter_b.fetch_add(1, Ordering::SeqCst);
    });
    assert!(dropped.is_none());

    // A forced request goes through regardless.
    let counter_c = Arc::clone(&counter);
    let forced = scheduler
        .request(true, async move {
            counter_c.fetch_add(1, Ordering::SeqCst);
        })
        .expect("forced request admitted");
    forced.await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_after_cooldown_is_admitted() {
    let scheduler = ResyncScheduler::new(COOLDOWN);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_a = Arc::clone(&counter);
    scheduler
        .request(false, async move {
            counter_a.fetch_add(1, Ordering::SeqCst);
        })
        .expect("admitted")
        .await;

    tokio::time::advance(COOLDOWN + Duration::from_millis(10)).await;

    let counter_b = Arc::clone(&counter);
    scheduler
        .request(false, async move {
            counter_b.fetch_add(1, Ordering::SeqCst);
        })
        .expect("admitted after cooldown")
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_timer_is_single_flight() {
    let timer = RetryTimer::new();
    let fired = Arc::new(AtomicUsize::new(0));

    let fired_a = Arc::clone(&fired);
    assert!(timer.schedule(Duration::from_secs(3), move || async move {
        fired_a.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(timer.is_pending());

    // A second schedule while one is pending is refused.
    let fired_b = Arc::clone(&fired);
    assert!(!timer.schedule(Duration::from_secs(3), move || async move {
        fired_b.fetch_add(1, Ordering::SeqCst);
    }));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!timer.is_pending());

    // After firing, the timer accepts a new schedule.
    let fired_c = Arc::clone(&fired);
    assert!(timer.schedule(Duration::from_secs(3), move || async move {
        fired_c.fetch_add(1, Ordering::SeqCst);
    }));
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_timer_cancel_prevents_firing() {
    let timer = RetryTimer::new();
    let fired = Arc::new(AtomicUsize::new(0));

    let fired_a = Arc::clone(&fired);
    timer.schedule(Duration::from_secs(3), move || async move {
        fired_a.fetch_add(1, Ordering::SeqCst);
    });
    timer.cancel();
    assert!(!timer.is_pending());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
