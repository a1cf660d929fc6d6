//! Push subscription client for BMarks.
//!
//! Maintains one change-feed subscription per tracked collection, scoped to
//! the current user. A subscription that errors, times out or closes is
//! reconnected after a fixed delay through a single-flight [`RetryTimer`];
//! the user is never interrupted. Incoming changes are applied directly to
//! the shared store state: deletes remove by id (clearing a matching
//! mid-edit marker), upserts merge by id and restore the collection
//! ordering. Events owned by a different user are ignored defensively; the
//! real access control lives server-side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::managers::sync_store::StoreState;
use crate::remote::RemoteCollections;
use crate::services::resync_scheduler::RetryTimer;
use crate::types::events::{Change, ChangeEvent, ChannelEvent, Collection};

struct Subscription {
    task: JoinHandle<()>,
    retry: Arc<RetryTimer>,
}

struct ClientInner {
    remote: Arc<dyn RemoteCollections>,
    state: Arc<StoreState>,
    retry_delay: Duration,
    subscriptions: Mutex<HashMap<Collection, Subscription>>,
    active: AtomicBool,
}

/// Owns the push subscriptions and their reconnect timers.
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl RealtimeClient {
    pub fn new(
        remote: Arc<dyn RemoteCollections>,
        state: Arc<StoreState>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                remote,
                state,
                retry_delay,
                subscriptions: Mutex::new(HashMap::new()),
                active: AtomicBool::new(false),
            }),
        }
    }

    /// Attaches one subscription per tracked collection for the user.
    pub fn subscribe_all(&self, user_id: &str) {
        self.inner.active.store(true, Ordering::SeqCst);
        for collection in [Collection::Bookmarks, Collection::Groups] {
            ClientInner::spawn_subscription(&self.inner, collection, user_id.to_string());
        }
    }

    /// Tears down every subscription and cancels pending retries. Called on
    /// sign-out and shutdown.
    pub fn unsubscribe_all(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        let mut subscriptions = self
            .inner
            .subscriptions
            .lock()
            .expect("realtime mutex poisoned");
        for (_, subscription) in subscriptions.drain() {
            subscription.retry.cancel();
            subscription.task.abort();
        }
    }

    /// Whether a reconnect timer is pending for the collection.
    pub fn retry_pending(&self, collection: Collection) -> bool {
        self.inner
            .subscriptions
            .lock()
            .expect("realtime mutex poisoned")
            .get(&collection)
            .map(|s| s.retry.is_pending())
            .unwrap_or(false)
    }
}

impl ClientInner {
    /// Spawns (or respawns) the subscription task for one collection,
    /// keeping the collection's retry timer across respawns so reconnects
    /// stay single-flight.
    fn spawn_subscription(inner: &Arc<ClientInner>, collection: Collection, user_id: String) {
        if !inner.active.load(Ordering::SeqCst) {
            return;
        }
        let mut subscriptions = inner.subscriptions.lock().expect("realtime mutex poisoned");
        let retry = subscriptions
            .get(&collection)
            .map(|s| Arc::clone(&s.retry))
            .unwrap_or_else(|| Arc::new(RetryTimer::new()));

        let run_inner = Arc::clone(inner);
        let task = tokio::spawn(ClientInner::run_subscription(
            run_inner, collection, user_id,
        ));
        subscriptions.insert(collection, Subscription { task, retry });
    }

    async fn run_subscription(inner: Arc<ClientInner>, collection: Collection, user_id: String) {
        let mut rx = match inner.remote.subscribe(collection, &user_id).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(
                    "Subscribe failed for {}: {}; retrying",
                    collection.as_str(),
                    e
                );
                ClientInner::schedule_retry(&inner, collection, user_id);
                return;
            }
        };

        while let Some(event) = rx.recv().await {
            match event {
                ChannelEvent::Status(status) if status.is_terminal() => {
                    warn!(
                        "Channel {} ended with {:?}; retrying",
                        collection.as_str(),
                        status
                    );
                    break;
                }
                ChannelEvent::Status(status) => {
                    debug!("Channel {} status {:?}", collection.as_str(), status);
                }
                ChannelEvent::Change(change) => inner.apply_change(change, &user_id),
            }
        }

        // Terminal status or the backend dropped the stream.
        ClientInner::schedule_retry(&inner, collection, user_id);
    }

    fn schedule_retry(inner: &Arc<ClientInner>, collection: Collection, user_id: String) {
        if !inner.active.load(Ordering::SeqCst) {
            return;
        }
        let retry = {
            let subscriptions = inner.subscriptions.lock().expect("realtime mutex poisoned");
            match subscriptions.get(&collection) {
                Some(s) => Arc::clone(&s.retry),
                None => return,
            }
        };
        let respawn_inner = Arc::clone(inner);
        retry.schedule(inner.retry_delay, move || async move {
            ClientInner::spawn_subscription(&respawn_inner, collection, user_id);
        });
    }

    /// Applies one incoming change to the shared state.
    fn apply_change(&self, event: ChangeEvent, user_id: &str) {
        if event.user_id != user_id {
            debug!("Ignoring change event for foreign user");
            return;
        }
        match (event.collection, event.change) {
            (Collection::Bookmarks, Change::UpsertBookmark(bookmark)) => {
                self.state.upsert_bookmark(bookmark);
            }
            (Collection::Groups, Change::UpsertGroup(group)) => {
                self.state.upsert_group(group);
            }
            (Collection::Bookmarks, Change::Delete { id }) => {
                self.state.remove_bookmark(&id);
            }
            (Collection::Groups, Change::Delete { id }) => {
                self.state.remove_group(&id);
                self.state.clear_group_refs(&id);
            }
            (collection, change) => {
                warn!(
                    "Mismatched change on {} channel: {:?}",
                    collection.as_str(),
                    change
                );
            }
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
