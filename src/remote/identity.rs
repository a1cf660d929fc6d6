//! Identity provider seam for BMarks.
//!
//! The OAuth handshake itself is delegated to an external provider; the
//! engine only consumes the resulting session lifecycle: probe the current
//! session, restore one from a cached token pair, sign out, and observe
//! auth events. [`LocalIdentityProvider`] is the in-process implementation
//! used by tests and the demo binary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::types::errors::SessionError;
use crate::types::events::AuthEvent;
use crate::types::session::{CachedTokens, Session};

/// Capacity of the auth event fan-out channel.
const AUTH_EVENT_CAPACITY: usize = 16;

/// The authenticated-session source consumed by the session manager.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider's current live session, if it has one.
    async fn current_session(&self) -> Result<Option<Session>, SessionError>;

    /// Attempts to rebuild a session from a cached token pair. `Ok(None)`
    /// means the tokens were rejected and the cache entry should go.
    async fn restore_session(
        &self,
        tokens: &CachedTokens,
    ) -> Result<Option<Session>, SessionError>;

    /// Signs the user out. Observers learn about it via an auth event.
    async fn sign_out(&self) -> Result<(), SessionError>;

    /// Subscribes to the provider's auth event stream.
    fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}

/// In-memory identity provider.
///
/// Holds one optional session, remembers which refresh tokens are
/// restorable, and lets callers drive the auth event stream by hand.
pub struct LocalIdentityProvider {
    session: Mutex<Option<Session>>,
    restorable: Mutex<HashMap<String, Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            session: Mutex::new(None),
            restorable: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *provider.session.lock().expect("provider mutex poisoned") = Some(session);
        provider
    }

    /// Marks a session as restorable through its refresh token, without
    /// making it current. Mirrors a previous browser visit that left a
    /// cached token pair behind.
    pub fn allow_restore(&self, session: Session) {
        self.restorable
            .lock()
            .expect("provider mutex poisoned")
            .insert(session.refresh_token.clone(), session);
    }

    /// Signs a user in and emits `SignedIn`.
    pub fn sign_in(&self, session: Session) {
        *self.session.lock().expect("provider mutex poisoned") = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }

    /// Replaces the current session's tokens and emits `TokenRefreshed`.
    pub fn refresh_tokens(&self, session: Session) {
        *self.session.lock().expect("provider mutex poisoned") = Some(session.clone());
        let _ = self.events.send(AuthEvent::TokenRefreshed(session));
    }

    /// Emits the startup `InitialSession` probe result, adopting the
    /// session as current when one is supplied.
    pub fn emit_initial_session(&self, session: Option<Session>) {
        if let Some(s) = &session {
            *self.session.lock().expect("provider mutex poisoned") = Some(s.clone());
        }
        let _ = self.events.send(AuthEvent::InitialSession(session));
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.session.lock().expect("provider mutex poisoned").clone())
    }

    async fn restore_session(
        &self,
        tokens: &CachedTokens,
    ) -> Result<Option<Session>, SessionError> {
        let restored = self
            .restorable
            .lock()
            .expect("provider mutex poisoned")
            .get(&tokens.refresh_token)
            .cloned();
        if let Some(session) = &restored {
            *self.session.lock().expect("provider mutex poisoned") = Some(session.clone());
        }
        Ok(restored)
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        *self.session.lock().expect("provider mutex poisoned") = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
