//! Session Manager for BMarks.
//!
//! Owns the authenticated session lifecycle: acquire on startup, restore
//! from the cached token pair, wait for the provider's asynchronous initial
//! session, refresh on focus/storage/cross-tab triggers, and redirect on
//! loss. State transitions are published on a watch channel the host
//! observes; "redirect to the landing view" is represented by the
//! `Unauthenticated { redirect: true }` state. When offline mode is
//! enabled a fixed local session is synthesized instead and all provider
//! interaction (including guards) is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::remote::IdentityProvider;
use crate::services::cache_store::CacheStore;
use crate::services::crosstab::CrosstabCoordinator;
use crate::time_utils::now_ms;
use crate::types::errors::SessionError;
use crate::types::events::AuthEvent;
use crate::types::launch::{LaunchParams, PendingBookmarkPayload};
use crate::types::session::Session;

/// Session lifecycle states.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unresolved,
    Resolving,
    Active(Session),
    /// No session. `redirect` asks the host to navigate to the landing /
    /// sign-in view.
    Unauthenticated { redirect: bool },
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

/// Result of a best-effort session refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Still the same access token; nothing to reload.
    Unchanged(Session),
    /// The token pair changed; the caller should force a full refetch.
    TokenChanged(Session),
    /// No session could be obtained.
    Lost,
}

/// Owns the session lifecycle; exactly one per engine instance.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<CacheStore>,
    crosstab: Arc<CrosstabCoordinator>,
    state_tx: Arc<watch::Sender<SessionState>>,
    guards_attached: AtomicBool,
    guard_task: Mutex<Option<JoinHandle<()>>>,
    initial_session_timeout: Duration,
    refresh_wait_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<CacheStore>,
        crosstab: Arc<CrosstabCoordinator>,
        initial_session_timeout: Duration,
        refresh_wait_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unresolved);
        Self {
            provider,
            cache,
            crosstab,
            state_tx: Arc::new(state_tx),
            guards_attached: AtomicBool::new(false),
            guard_task: Mutex::new(None),
            initial_session_timeout,
            refresh_wait_timeout,
        }
    }

    /// Observer handle for session state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state_tx.borrow().session().cloned()
    }

    /// Resolves a session before anything else runs.
    ///
    /// Offline mode synthesizes the fixed local session and skips the
    /// provider entirely. Otherwise the sources are tried in order: live
    /// provider session, restore from the cached token pair, bounded wait
    /// for the provider's initial-session signal. When all three are
    /// exhausted, any pending deep-link payload is persisted before the
    /// state moves to `Unauthenticated { redirect: true }`.
    pub async fn ensure_session(&self, pending: Option<&LaunchParams>) -> Option<Session> {
        if self.cache.offline_enabled() {
            let session = Session::offline();
            self.state_tx
                .send_replace(SessionState::Active(session.clone()));
            return Some(session);
        }

        self.state_tx.send_replace(SessionState::Resolving);

        let mut session = match self.provider.current_session().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Session probe failed: {}", e);
                None
            }
        };

        if session.is_none() {
            session = self.restore_from_cache().await;
        }

        if session.is_none() {
            session = self
                .wait_for_initial_session(self.initial_session_timeout)
                .await;
        }

        match session {
            Some(session) => {
                self.cache.cache_tokens(&session.tokens());
                self.state_tx
                    .send_replace(SessionState::Active(session.clone()));
                self.attach_guards();
                Some(session)
            }
            None => {
                if let Some(params) = pending {
                    if params.has_payload() {
                        self.cache
                            .store_pending_bookmark(&PendingBookmarkPayload::from_params(
                                params,
                                now_ms(),
                            ));
                    }
                }
                self.state_tx
                    .send_replace(SessionState::Unauthenticated { redirect: true });
                None
            }
        }
    }

    async fn restore_from_cache(&self) -> Option<Session> {
        let tokens = self.cache.cached_tokens()?;
        match self.provider.restore_session(&tokens).await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                self.cache.clear_cached_tokens();
                None
            }
            Err(e) => {
                warn!("Session restore failed: {}", e);
                self.cache.clear_cached_tokens();
                None
            }
        }
    }

    /// Waits up to `timeout` for the provider's `InitialSession` event.
    async fn wait_for_initial_session(&self, timeout: Duration) -> Option<Session> {
        let mut events = self.provider.subscribe_auth_events();
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::InitialSession(session)) => return session,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(None)
    }

    /// Attaches the long-lived session guards. Idempotent: a second call is
    /// a no-op.
    ///
    /// The guard task mirrors provider auth events into session state,
    /// keeps the token cache current and announces gains/losses to other
    /// tabs.
    fn attach_guards(&self) {
        if self.guards_attached.swap(true, Ordering::SeqCst) {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let crosstab = Arc::clone(&self.crosstab);
        let state_tx = Arc::clone(&self.state_tx);

        let task = tokio::spawn(async move {
            let mut events = provider.subscribe_auth_events();
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedOut) => {
                        cache.clear_cached_tokens();
                        crosstab.broadcast_auth(false);
                        state_tx.send_replace(SessionState::Unauthenticated { redirect: true });
                    }
                    Ok(AuthEvent::SignedIn(session))
                    | Ok(AuthEvent::TokenRefreshed(session))
                    | Ok(AuthEvent::InitialSession(Some(session))) => {
                        cache.cache_tokens(&session.tokens());
                        crosstab.broadcast_auth(true);
                        state_tx.send_replace(SessionState::Active(session));
                    }
                    Ok(AuthEvent::InitialSession(None)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Auth guard lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.guard_task.lock().expect("session mutex poisoned") = Some(task);
    }

    /// Whether the guards have been attached.
    pub fn guards_attached(&self) -> bool {
        self.guards_attached.load(Ordering::SeqCst)
    }

    /// Best-effort refresh, used by the focus/storage/cross-tab triggers.
    ///
    /// A transient failure never forces a redirect unless explicitly
    /// requested, so a flaky network blip does not bounce the user through
    /// sign-in.
    pub async fn refresh_session(
        &self,
        allow_wait: bool,
        redirect_on_failure: bool,
    ) -> RefreshOutcome {
        let mut session = match self.provider.current_session().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                None
            }
        };

        if session.is_none() && allow_wait {
            session = self
                .wait_for_initial_session(self.refresh_wait_timeout)
                .await;
        }

        match session {
            None => {
                if redirect_on_failure {
                    self.cache.clear_cached_tokens();
                    self.state_tx
                        .send_replace(SessionState::Unauthenticated { redirect: true });
                }
                RefreshOutcome::Lost
            }
            Some(session) => {
                let changed = self
                    .current_session()
                    .map(|current| current.access_token != session.access_token)
                    .unwrap_or(true);
                self.cache.cache_tokens(&session.tokens());
                self.state_tx
                    .send_replace(SessionState::Active(session.clone()));
                if changed {
                    RefreshOutcome::TokenChanged(session)
                } else {
                    RefreshOutcome::Unchanged(session)
                }
            }
        }
    }

    /// Reacts to another tab losing its session: local teardown without
    /// re-broadcasting, so tabs do not ping-pong sign-out messages.
    pub fn handle_remote_sign_out(&self) {
        self.cache.clear_cached_tokens();
        self.state_tx
            .send_replace(SessionState::Unauthenticated { redirect: true });
    }

    /// Signs out at the provider. The guard task performs the local
    /// teardown when the provider confirms with a `SignedOut` event.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.provider.sign_out().await
    }

    /// Stops the guard task.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .guard_task
            .lock()
            .expect("session mutex poisoned")
            .take()
        {
            task.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
