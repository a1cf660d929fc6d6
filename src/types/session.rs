use serde::{Deserialize, Serialize};

/// User id synthesized for the provider-free offline session.
pub const OFFLINE_USER_ID: &str = "local-offline";

/// The authenticated identity and credential pair for the current client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Approximate expiry in milliseconds since the UNIX epoch; 0 means
    /// no expiry (offline sessions).
    pub expires_approx: i64,
}

impl Session {
    /// Fixed local session used when offline mode is enabled.
    ///
    /// Carries no provider credentials and never refreshes.
    pub fn offline() -> Self {
        Self {
            user_id: OFFLINE_USER_ID.to_string(),
            access_token: String::new(),
            refresh_token: String::new(),
            expires_approx: 0,
        }
    }

    /// Whether this is the synthesized offline session.
    pub fn is_offline(&self) -> bool {
        self.user_id == OFFLINE_USER_ID
    }

    /// The persistable part of the session. Only the token pair is ever
    /// written to local storage, never the profile.
    pub fn tokens(&self) -> CachedTokens {
        CachedTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Token pair cached locally so a session can be restored after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTokens {
    pub access_token: String,
    pub refresh_token: String,
}
