use std::fmt;

// === SessionError ===

/// Errors related to session lifecycle operations.
#[derive(Debug)]
pub enum SessionError {
    /// The identity provider rejected or failed the request.
    ProviderError(String),
    /// No session could be obtained from any source.
    NotAuthenticated,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ProviderError(msg) => write!(f, "Identity provider error: {}", msg),
            SessionError::NotAuthenticated => write!(f, "Not authenticated"),
        }
    }
}

impl std::error::Error for SessionError {}

// === RemoteError ===

/// Errors returned by the remote collections backend.
#[derive(Debug)]
pub enum RemoteError {
    /// A network-level failure (connect, timeout, broken stream).
    NetworkError(String),
    /// The backend answered with an error status.
    ApiError(String),
    /// The backend rejected the credentials.
    Unauthorized,
    /// The addressed row does not exist.
    NotFound(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::NetworkError(msg) => write!(f, "Remote network error: {}", msg),
            RemoteError::ApiError(msg) => write!(f, "Remote API error: {}", msg),
            RemoteError::Unauthorized => write!(f, "Remote request unauthorized"),
            RemoteError::NotFound(id) => write!(f, "Remote row not found: {}", id),
        }
    }
}

impl std::error::Error for RemoteError {}

// === SyncError ===

/// Errors surfaced by bookmark/group store operations.
#[derive(Debug)]
pub enum SyncError {
    /// Bookmark with the given ID was not found.
    NotFound(String),
    /// The target group was not found.
    GroupNotFound(String),
    /// Plain text content requires a manually supplied title.
    TitleRequired,
    /// The submitted content was empty after trimming.
    EmptyContent,
    /// No active session; the operation needs an authenticated user.
    SessionRequired,
    /// The remote call failed.
    RemoteError(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            SyncError::GroupNotFound(id) => write!(f, "Group not found: {}", id),
            SyncError::TitleRequired => {
                write!(f, "A title is required for plain text bookmarks")
            }
            SyncError::EmptyContent => write!(f, "Bookmark content is empty"),
            SyncError::SessionRequired => write!(f, "No active session"),
            SyncError::RemoteError(msg) => write!(f, "Remote store error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

// === CacheError ===

/// Errors internal to the local cache layer.
///
/// These never cross the cache boundary. Callers see "as if empty" reads
/// and best-effort writes; the error is logged and swallowed at the edge.
#[derive(Debug)]
pub enum CacheError {
    /// The underlying storage rejected the operation.
    StorageError(String),
    /// Failed to serialize or deserialize a cached value.
    SerializationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::StorageError(msg) => write!(f, "Cache storage error: {}", msg),
            CacheError::SerializationError(msg) => {
                write!(f, "Cache serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CacheError {}
