//! Engine composition root for BMarks.
//!
//! Owns every collaborator and wires them together: session resolution
//! first, then the initial full load, then push subscriptions and the
//! cross-tab dispatch loop. All five trigger sources (focus, storage,
//! visibility, broadcast, push recovery) funnel through the store's
//! coalescing resync gate. No ambient singletons; hosts hold the `Engine`
//! and pass references down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::database::Database;
use crate::managers::session_manager::{RefreshOutcome, SessionManager};
use crate::managers::sync_store::BookmarkSyncStore;
use crate::remote::{IdentityProvider, RemoteCollections};
use crate::services::cache_store::CacheStore;
use crate::services::crosstab::{BroadcastHub, CrosstabCoordinator};
use crate::services::realtime_client::RealtimeClient;
use crate::types::errors::SessionError;
use crate::types::events::TabMessageBody;
use crate::types::launch::{ComposePrefill, LaunchParams};

/// Tunable constants of the engine. The defaults carry the product values;
/// tests override individual fields.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cooldown window between completed resyncs.
    pub resync_cooldown: Duration,
    /// Fixed delay before a dropped push subscription reconnects.
    pub retry_delay: Duration,
    /// How long startup waits for the provider's initial-session signal.
    pub initial_session_timeout: Duration,
    /// How long a best-effort refresh waits for a session to arrive.
    pub refresh_wait_timeout: Duration,
    /// Bound on the title-resolution fetch.
    pub title_fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resync_cooldown: Duration::from_millis(1500),
            retry_delay: Duration::from_secs(3),
            initial_session_timeout: Duration::from_secs(4),
            refresh_wait_timeout: Duration::from_secs(2),
            title_fetch_timeout: Duration::from_secs(4),
        }
    }
}

/// The assembled engine.
pub struct Engine {
    session: Arc<SessionManager>,
    store: Arc<BookmarkSyncStore>,
    realtime: RealtimeClient,
    crosstab: Arc<CrosstabCoordinator>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Builds and starts the engine.
    ///
    /// Resolves a session first; when none is obtainable the engine is
    /// returned in the `Unauthenticated` state with nothing attached (the
    /// host redirects). Otherwise performs the initial full load, attaches
    /// push subscriptions (online sessions only) and the cross-tab
    /// dispatcher, and consumes any launch intent into a compose prefill.
    pub async fn start(
        config: EngineConfig,
        db: Arc<Database>,
        provider: Arc<dyn IdentityProvider>,
        remote: Arc<dyn RemoteCollections>,
        hub: &BroadcastHub,
        launch: Option<LaunchParams>,
    ) -> (Arc<Engine>, Option<ComposePrefill>) {
        let cache = Arc::new(CacheStore::new(db));
        let crosstab = Arc::new(CrosstabCoordinator::new(hub));
        let session = Arc::new(SessionManager::new(
            provider,
            Arc::clone(&cache),
            Arc::clone(&crosstab),
            config.initial_session_timeout,
            config.refresh_wait_timeout,
        ));
        let store = Arc::new(BookmarkSyncStore::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
            Arc::clone(&crosstab),
            Arc::clone(&session),
            &config,
        ));
        let realtime = RealtimeClient::new(remote, store.state(), config.retry_delay);

        let engine = Arc::new(Engine {
            session: Arc::clone(&session),
            store: Arc::clone(&store),
            realtime,
            crosstab: Arc::clone(&crosstab),
            dispatch_task: Mutex::new(None),
        });

        let active = match engine.session.ensure_session(launch.as_ref()).await {
            Some(session) => session,
            None => return (engine, None),
        };

        if let Err(e) = engine.store.fetch_all().await {
            warn!("Initial load failed: {}", e);
        }

        if !active.is_offline() {
            engine.realtime.subscribe_all(&active.user_id);
        }

        engine.attach_dispatch(session, store, crosstab);

        let prefill = engine.store.apply_launch_params(launch);
        (engine, prefill)
    }

    /// Spawns the cross-tab dispatch loop: auth messages route to the
    /// session manager, data messages force a coalesced resync. Messages
    /// stamped with this tab's own origin id are dropped.
    fn attach_dispatch(
        &self,
        session: Arc<SessionManager>,
        store: Arc<BookmarkSyncStore>,
        crosstab: Arc<CrosstabCoordinator>,
    ) {
        let mut rx = crosstab.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        if !crosstab.accepts(&message) {
                            continue;
                        }
                        match message.body {
                            TabMessageBody::Auth { has_session: false } => {
                                session.handle_remote_sign_out();
                            }
                            TabMessageBody::Auth { has_session: true } => {
                                let _ = session.refresh_session(true, false).await;
                            }
                            TabMessageBody::Data { .. } => {
                                Arc::clone(&store).request_resync(true);
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self
            .dispatch_task
            .lock()
            .expect("engine mutex poisoned") = Some(task);
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn store(&self) -> &Arc<BookmarkSyncStore> {
        &self.store
    }

    pub fn crosstab(&self) -> &Arc<CrosstabCoordinator> {
        &self.crosstab
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    // === trigger surface wired to host events ===

    /// Window regained focus: best-effort session refresh, then a resync
    /// (forced when the token pair changed).
    pub async fn on_focus(&self) {
        if self.store.is_offline() {
            return;
        }
        match self.session.refresh_session(true, false).await {
            RefreshOutcome::TokenChanged(_) => {
                Arc::clone(&self.store).request_resync(true);
            }
            RefreshOutcome::Unchanged(_) => {
                Arc::clone(&self.store).request_resync(false);
            }
            RefreshOutcome::Lost => {}
        }
    }

    /// Document visibility flipped to visible.
    pub fn on_visibility_visible(&self) {
        Arc::clone(&self.store).request_resync(false);
    }

    /// The browser came back online.
    pub fn on_online(&self) {
        Arc::clone(&self.store).request_resync(false);
    }

    /// The auth storage key was mutated by another context.
    pub async fn on_auth_storage_change(&self) {
        if self.store.is_offline() {
            return;
        }
        let _ = self.session.refresh_session(true, false).await;
    }

    /// Signs out: push subscriptions and their retry timers are torn down,
    /// then the provider sign-out runs (its event triggers the session
    /// teardown and the cross-tab announcement).
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.realtime.unsubscribe_all();
        self.session.sign_out().await
    }

    /// Stops every background task.
    pub fn shutdown(&self) {
        self.realtime.unsubscribe_all();
        if let Some(task) = self
            .dispatch_task
            .lock()
            .expect("engine mutex poisoned")
            .take()
        {
            task.abort();
        }
        self.session.shutdown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
