//! Coalescing and single-flight primitives for BMarks.
//!
//! Several trigger sources (tab focus, visibility, the online event, cross-
//! tab notifications, push-channel recovery) can all demand work at nearly
//! the same moment. The two guards here bound that work: [`ResyncScheduler`]
//! coalesces full refetches into at most one in flight with a cooldown
//! between completions, and [`RetryTimer`] guarantees at most one pending
//! reconnect timer per subscription.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The shared handle to an in-flight resync. Cloneable; every concurrent
/// caller awaits the same underlying refetch.
pub type SharedResync = Shared<BoxFuture<'static, ()>>;

struct SchedulerInner {
    in_flight: Option<SharedResync>,
    last_completed: Option<Instant>,
}

/// Coalesces resync requests into bounded-rate full refetches.
///
/// Invariants: at most one refetch in flight at a time (a concurrent
/// request returns the existing in-flight future), and a non-forced request
/// within the cooldown window since the last completed resync is dropped
/// entirely.
pub struct ResyncScheduler {
    cooldown: Duration,
    inner: Arc<Mutex<SchedulerInner>>,
}

impl ResyncScheduler {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            inner: Arc::new(Mutex::new(SchedulerInner {
                in_flight: None,
                last_completed: None,
            })),
        }
    }

    /// Requests a resync, supplying the refetch to run if one is admitted.
    ///
    /// Returns the in-flight handle when a refetch is already running, a
    /// new handle when this request starts one, and `None` when a
    /// non-forced request lands inside the cooldown window. The admitted
    /// refetch is driven to completion even if no caller awaits the handle.
    pub fn request<F>(&self, force: bool, refetch: F) -> Option<SharedResync>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().expect("resync scheduler mutex poisoned");

        if let Some(active) = inner.in_flight.as_ref() {
            return Some(active.clone());
        }

        if !force {
            if let Some(done) = inner.last_completed {
                if done.elapsed() < self.cooldown {
                    return None;
                }
            }
        }

        let handle = Arc::clone(&self.inner);
        let shared: SharedResync = async move {
            refetch.await;
            let mut inner = handle.lock().expect("resync scheduler mutex poisoned");
            inner.last_completed = Some(Instant::now());
            inner.in_flight = None;
        }
        .boxed()
        .shared();

        inner.in_flight = Some(shared.clone());
        tokio::spawn(shared.clone());
        Some(shared)
    }

    /// Whether no refetch is currently in flight.
    pub fn is_idle(&self) -> bool {
        self.inner
            .lock()
            .expect("resync scheduler mutex poisoned")
            .in_flight
            .is_none()
    }
}

/// A single-flight delayed task: at most one pending timer at a time.
///
/// Used for subscription reconnects, where a burst of terminal channel
/// statuses must collapse into one retry.
pub struct RetryTimer {
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedules `task` to run after `delay`.
    ///
    /// Returns `false` without scheduling when a timer is already pending.
    /// The pending slot is released just before the task body runs, so the
    /// task itself may schedule a follow-up.
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().expect("retry timer mutex poisoned");
        if let Some(handle) = pending.as_ref() {
            if !handle.is_finished() {
                return false;
            }
        }

        let slot = Arc::clone(&self.pending);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = slot.lock().expect("retry timer mutex poisoned");
                *slot = None;
            }
            task().await;
        }));
        true
    }

    /// Cancels any pending timer. The task does not run.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().expect("retry timer mutex poisoned");
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    /// Whether a timer is currently pending.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .expect("retry timer mutex poisoned")
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new()
    }
}
