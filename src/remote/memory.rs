//! In-memory remote collections backend.
//!
//! Serves as the test double and demo backend: per-user row storage, a
//! request counter, failure injection, and hand-driven push channels so
//! tests can emit change events and terminal channel statuses on demand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::bookmark::Bookmark;
use crate::types::errors::RemoteError;
use crate::types::events::{ChannelEvent, ChannelStatus, Collection};
use crate::types::group::Group;

use super::RemoteCollections;

/// Buffered capacity of each push channel.
const CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    collection: Collection,
    user_id: String,
    tx: mpsc::Sender<ChannelEvent>,
}

/// In-memory implementation of [`RemoteCollections`].
pub struct InMemoryRemote {
    bookmarks: Mutex<HashMap<String, Vec<Bookmark>>>,
    groups: Mutex<HashMap<String, Vec<Group>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    requests: AtomicUsize,
    list_calls: AtomicUsize,
    fail_requests: AtomicBool,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            bookmarks: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            fail_requests: AtomicBool::new(false),
        }
    }

    /// Total number of requests this backend has received.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of list (full fetch) requests received, both collections.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// When set, every request fails with an injected network error.
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Pushes an event to every live subscriber of the collection whose
    /// user scope matches the event-independent `user_id` filter.
    pub async fn push_event(&self, collection: Collection, user_id: &str, event: ChannelEvent) {
        let targets: Vec<mpsc::Sender<ChannelEvent>> = {
            let subscribers = self.subscribers.lock().expect("remote mutex poisoned");
            subscribers
                .iter()
                .filter(|s| s.collection == collection && s.user_id == user_id)
                .map(|s| s.tx.clone())
                .collect()
        };
        for tx in targets {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// Drops every subscriber's channel, as if the backend closed them.
    pub fn drop_subscribers(&self) {
        self.subscribers
            .lock()
            .expect("remote mutex poisoned")
            .clear();
    }

    /// Number of live subscriptions. Channels whose receiving end was
    /// dropped are pruned on the way.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().expect("remote mutex poisoned");
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    fn record(&self, is_list: bool) -> Result<(), RemoteError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if is_list {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            Err(RemoteError::NetworkError("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCollections for InMemoryRemote {
    async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, RemoteError> {
        self.record(true)?;
        let store = self.bookmarks.lock().expect("remote mutex poisoned");
        let mut rows = store.get(user_id).cloned().unwrap_or_default();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn search_bookmarks(
        &self,
        user_id: &str,
        group_id: Option<&str>,
        term: &str,
    ) -> Result<Vec<Bookmark>, RemoteError> {
        self.record(false)?;
        let needle = term.to_lowercase();
        let store = self.bookmarks.lock().expect("remote mutex poisoned");
        let mut rows: Vec<Bookmark> = store
            .get(user_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| group_id.is_none() || b.group_id.as_deref() == group_id)
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.payload.content_text().to_lowercase().contains(&needle)
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError> {
        self.record(false)?;
        let mut store = self.bookmarks.lock().expect("remote mutex poisoned");
        store
            .entry(user_id.to_string())
            .or_default()
            .push(bookmark.clone());
        Ok(bookmark.clone())
    }

    async fn update_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError> {
        self.record(false)?;
        let mut store = self.bookmarks.lock().expect("remote mutex poisoned");
        let rows = store
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound(bookmark.id.clone()))?;
        let slot = rows
            .iter_mut()
            .find(|b| b.id == bookmark.id)
            .ok_or_else(|| RemoteError::NotFound(bookmark.id.clone()))?;
        *slot = bookmark.clone();
        Ok(bookmark.clone())
    }

    async fn delete_bookmark(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        self.record(false)?;
        let mut store = self.bookmarks.lock().expect("remote mutex poisoned");
        let rows = store
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        let before = rows.len();
        rows.retain(|b| b.id != id);
        if rows.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_groups(&self, user_id: &str) -> Result<Vec<Group>, RemoteError> {
        self.record(true)?;
        let store = self.groups.lock().expect("remote mutex poisoned");
        let mut rows = store.get(user_id).cloned().unwrap_or_default();
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(rows)
    }

    async fn create_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError> {
        self.record(false)?;
        let mut store = self.groups.lock().expect("remote mutex poisoned");
        store
            .entry(user_id.to_string())
            .or_default()
            .push(group.clone());
        Ok(group.clone())
    }

    async fn update_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError> {
        self.record(false)?;
        let mut store = self.groups.lock().expect("remote mutex poisoned");
        let rows = store
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound(group.id.clone()))?;
        let slot = rows
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| RemoteError::NotFound(group.id.clone()))?;
        *slot = group.clone();
        Ok(group.clone())
    }

    async fn delete_group(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        self.record(false)?;
        let mut groups = self.groups.lock().expect("remote mutex poisoned");
        let rows = groups
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        let before = rows.len();
        rows.retain(|g| g.id != id);
        if rows.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        drop(groups);

        // The backend contract clears the group reference on dependents.
        let mut bookmarks = self.bookmarks.lock().expect("remote mutex poisoned");
        if let Some(rows) = bookmarks.get_mut(user_id) {
            for bookmark in rows.iter_mut() {
                if bookmark.group_id.as_deref() == Some(id) {
                    bookmark.group_id = None;
                }
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> Result<mpsc::Receiver<ChannelEvent>, RemoteError> {
        self.record(false)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let _ = tx.send(ChannelEvent::Status(ChannelStatus::Subscribed)).await;
        self.subscribers
            .lock()
            .expect("remote mutex poisoned")
            .push(Subscriber {
                collection,
                user_id: user_id.to_string(),
                tx,
            });
        Ok(rx)
    }
}
