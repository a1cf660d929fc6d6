//! External collaborators of the BMarks engine.
//!
//! The remote data store and the identity provider are consumed behind
//! object-safe async traits so the engine, its tests and the demo binary
//! can run against the HTTP implementations or in-memory fakes
//! interchangeably.

pub mod http;
pub mod identity;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::bookmark::Bookmark;
use crate::types::errors::RemoteError;
use crate::types::events::{ChannelEvent, Collection};
use crate::types::group::Group;

pub use identity::IdentityProvider;

/// The remote bookmark/group store, scoped per user.
///
/// The backend contract is fixed: point create/update/delete, list-by-user
/// (optionally filtered by group and substring search), and a push change
/// feed per collection filtered to the current user. Row ids are generated
/// client-side; create/update return the stored row.
#[async_trait]
pub trait RemoteCollections: Send + Sync {
    async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, RemoteError>;

    /// Case-insensitive substring search over title/content/url, optionally
    /// restricted to one group.
    async fn search_bookmarks(
        &self,
        user_id: &str,
        group_id: Option<&str>,
        term: &str,
    ) -> Result<Vec<Bookmark>, RemoteError>;

    async fn create_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError>;

    async fn update_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError>;

    async fn delete_bookmark(&self, user_id: &str, id: &str) -> Result<(), RemoteError>;

    async fn list_groups(&self, user_id: &str) -> Result<Vec<Group>, RemoteError>;

    async fn create_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError>;

    async fn update_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError>;

    /// Deletes a group. The backend clears (never deletes) the group
    /// reference on dependent bookmarks.
    async fn delete_group(&self, user_id: &str, id: &str) -> Result<(), RemoteError>;

    /// Opens a push subscription for one collection, scoped to the user.
    /// The channel delivers status transitions and row changes; it ends
    /// when the subscription dies.
    async fn subscribe(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> Result<mpsc::Receiver<ChannelEvent>, RemoteError>;
}
