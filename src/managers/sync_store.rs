//! Bookmark sync store for BMarks.
//!
//! The single source of truth consumed by the rendering layer. Composes the
//! local cache, the remote collections client, the resync scheduler and the
//! cross-tab coordinator into CRUD operations that branch between "offline
//! local" and "remote" code paths transparently. Every mutation is
//! optimistic-on-success only: in-memory state is not touched until the
//! remote call resolves, so a failed mutation leaves the view consistent
//! with the last known-good state.

use std::sync::{Arc, Mutex};

use tracing::warn;
use uuid::Uuid;

use crate::managers::session_manager::SessionManager;
use crate::remote::RemoteCollections;
use crate::services::cache_store::CacheStore;
use crate::services::content_classifier::{classify, resolve_favicon_url, ClassifiedContent};
use crate::services::crosstab::CrosstabCoordinator;
use crate::services::resync_scheduler::{ResyncScheduler, SharedResync};
use crate::services::title_resolver::TitleResolver;
use crate::time_utils::now_ms;
use crate::types::bookmark::{Bookmark, BookmarkDraft, BookmarkPayload};
use crate::types::errors::SyncError;
use crate::types::events::DataChange;
use crate::types::group::Group;
use crate::types::launch::{ComposePrefill, LaunchParams, PendingBookmarkPayload};

use crate::app::EngineConfig;

/// The in-memory bookmark/group collections plus the mid-edit marker.
///
/// Owned by [`BookmarkSyncStore`] and mutated only through its methods or
/// the realtime change handler; no other component may write to it.
pub struct StoreState {
    bookmarks: Mutex<Vec<Bookmark>>,
    groups: Mutex<Vec<Group>>,
    editing_bookmark_id: Mutex<Option<String>>,
}

impl StoreState {
    pub fn new() -> Self {
        Self {
            bookmarks: Mutex::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
            editing_bookmark_id: Mutex::new(None),
        }
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.lock().expect("store state mutex poisoned").clone()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.groups.lock().expect("store state mutex poisoned").clone()
    }

    pub fn set_bookmarks(&self, mut rows: Vec<Bookmark>) {
        Self::sort_bookmarks(&mut rows);
        *self.bookmarks.lock().expect("store state mutex poisoned") = rows;
    }

    pub fn set_groups(&self, mut rows: Vec<Group>) {
        Self::sort_groups(&mut rows);
        *self.groups.lock().expect("store state mutex poisoned") = rows;
    }

    /// Replaces the bookmark by id or prepends it, then restores the
    /// newest-first ordering.
    pub fn upsert_bookmark(&self, bookmark: Bookmark) {
        let mut rows = self.bookmarks.lock().expect("store state mutex poisoned");
        match rows.iter_mut().find(|b| b.id == bookmark.id) {
            Some(slot) => *slot = bookmark,
            None => rows.insert(0, bookmark),
        }
        Self::sort_bookmarks(&mut rows);
    }

    /// Replaces the group by id or appends it, then restores alphabetical
    /// ordering.
    pub fn upsert_group(&self, group: Group) {
        let mut rows = self.groups.lock().expect("store state mutex poisoned");
        match rows.iter_mut().find(|g| g.id == group.id) {
            Some(slot) => *slot = group,
            None => rows.push(group),
        }
        Self::sort_groups(&mut rows);
    }

    /// Removes a bookmark by id. Clears the mid-edit marker when it
    /// pointed at the removed bookmark. Returns whether a row was removed.
    pub fn remove_bookmark(&self, id: &str) -> bool {
        let mut rows = self.bookmarks.lock().expect("store state mutex poisoned");
        let before = rows.len();
        rows.retain(|b| b.id != id);
        let removed = rows.len() != before;
        drop(rows);
        if removed {
            let mut editing = self
                .editing_bookmark_id
                .lock()
                .expect("store state mutex poisoned");
            if editing.as_deref() == Some(id) {
                *editing = None;
            }
        }
        removed
    }

    pub fn remove_group(&self, id: &str) -> bool {
        let mut rows = self.groups.lock().expect("store state mutex poisoned");
        let before = rows.len();
        rows.retain(|g| g.id != id);
        rows.len() != before
    }

    /// Clears (never deletes) the group reference on dependent bookmarks.
    pub fn clear_group_refs(&self, group_id: &str) {
        let mut rows = self.bookmarks.lock().expect("store state mutex poisoned");
        for bookmark in rows.iter_mut() {
            if bookmark.group_id.as_deref() == Some(group_id) {
                bookmark.group_id = None;
            }
        }
    }

    pub fn find_bookmark(&self, id: &str) -> Option<Bookmark> {
        self.bookmarks
            .lock()
            .expect("store state mutex poisoned")
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn has_group(&self, id: &str) -> bool {
        self.groups
            .lock()
            .expect("store state mutex poisoned")
            .iter()
            .any(|g| g.id == id)
    }

    pub fn editing_bookmark_id(&self) -> Option<String> {
        self.editing_bookmark_id
            .lock()
            .expect("store state mutex poisoned")
            .clone()
    }

    /// Marks which bookmark the host currently has open for editing.
    pub fn set_editing_bookmark(&self, id: Option<String>) {
        *self
            .editing_bookmark_id
            .lock()
            .expect("store state mutex poisoned") = id;
    }

    fn sort_bookmarks(rows: &mut [Bookmark]) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn sort_groups(rows: &mut [Group]) {
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// The composed bookmark/group store.
pub struct BookmarkSyncStore {
    remote: Arc<dyn RemoteCollections>,
    cache: Arc<CacheStore>,
    crosstab: Arc<CrosstabCoordinator>,
    session: Arc<SessionManager>,
    titles: TitleResolver,
    state: Arc<StoreState>,
    scheduler: ResyncScheduler,
}

impl BookmarkSyncStore {
    pub fn new(
        remote: Arc<dyn RemoteCollections>,
        cache: Arc<CacheStore>,
        crosstab: Arc<CrosstabCoordinator>,
        session: Arc<SessionManager>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            remote,
            cache,
            crosstab,
            session,
            titles: TitleResolver::new(config.title_fetch_timeout),
            state: Arc::new(StoreState::new()),
            scheduler: ResyncScheduler::new(config.resync_cooldown),
        }
    }

    /// Shared handle to the in-memory collections. Handed to the realtime
    /// client; the rendering layer reads through it.
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&self.state)
    }

    fn offline(&self) -> bool {
        self.cache.offline_enabled()
    }

    fn user_id(&self) -> Result<String, SyncError> {
        self.session
            .current_session()
            .map(|s| s.user_id)
            .ok_or(SyncError::SessionRequired)
    }

    /// Full load of both collections: remote when online, snapshot when
    /// offline.
    pub async fn fetch_all(&self) -> Result<(), SyncError> {
        if self.offline() {
            self.state.set_groups(self.cache.offline_groups());
            self.state.set_bookmarks(self.cache.offline_bookmarks());
            return Ok(());
        }
        let user_id = self.user_id()?;
        let groups = self
            .remote
            .list_groups(&user_id)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        let bookmarks = self
            .remote
            .list_bookmarks(&user_id)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.set_groups(groups);
        self.state.set_bookmarks(bookmarks);
        Ok(())
    }

    /// Requests a coalesced resync; see [`ResyncScheduler`] for the
    /// single-flight and cooldown semantics.
    pub fn request_resync(self: Arc<Self>, force: bool) -> Option<SharedResync> {
        let store = Arc::clone(&self);
        self.scheduler.request(force, async move {
            if let Err(e) = store.fetch_all().await {
                warn!("Resync failed: {}", e);
            }
        })
    }

    // === bookmark CRUD ===

    /// Creates a bookmark from raw content. Classification picks the
    /// variant; a manual title wins, otherwise one is resolved (plain text
    /// with no title is a validation failure).
    pub async fn create_bookmark(&self, draft: BookmarkDraft) -> Result<Bookmark, SyncError> {
        let content = draft.content.trim().to_string();
        if content.is_empty() {
            return Err(SyncError::EmptyContent);
        }
        let classified = classify(&content);
        let title = self.resolve_draft_title(&draft, &classified).await?;
        if let Some(gid) = &draft.group_id {
            if !self.group_exists(gid) {
                return Err(SyncError::GroupNotFound(gid.clone()));
            }
        }

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            group_id: draft.group_id.clone(),
            title,
            created_at: now_ms(),
            payload: build_payload(&classified, &content),
        };

        if self.offline() {
            let mut rows = self.cache.offline_bookmarks();
            rows.insert(0, bookmark.clone());
            self.cache.put_offline_bookmarks(&rows);
            self.state.upsert_bookmark(bookmark.clone());
            return Ok(bookmark);
        }

        let user_id = self.user_id()?;
        let stored = self
            .remote
            .create_bookmark(&user_id, &bookmark)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.upsert_bookmark(stored.clone());
        self.crosstab.broadcast_data(DataChange::BookmarksChanged, None);
        Ok(stored)
    }

    /// Rewrites an existing bookmark from fresh content, keeping its id and
    /// creation time.
    pub async fn update_bookmark(
        &self,
        id: &str,
        draft: BookmarkDraft,
    ) -> Result<Bookmark, SyncError> {
        let content = draft.content.trim().to_string();
        if content.is_empty() {
            return Err(SyncError::EmptyContent);
        }
        let existing = self
            .find_existing(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        let classified = classify(&content);
        let title = self.resolve_draft_title(&draft, &classified).await?;
        if let Some(gid) = &draft.group_id {
            if !self.group_exists(gid) {
                return Err(SyncError::GroupNotFound(gid.clone()));
            }
        }

        let bookmark = Bookmark {
            id: existing.id.clone(),
            group_id: draft.group_id.clone(),
            title,
            created_at: existing.created_at,
            payload: build_payload(&classified, &content),
        };

        if self.offline() {
            let mut rows = self.cache.offline_bookmarks();
            if let Some(slot) = rows.iter_mut().find(|b| b.id == id) {
                *slot = bookmark.clone();
            }
            self.cache.put_offline_bookmarks(&rows);
            self.state.upsert_bookmark(bookmark.clone());
            return Ok(bookmark);
        }

        let user_id = self.user_id()?;
        let stored = self
            .remote
            .update_bookmark(&user_id, &bookmark)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.upsert_bookmark(stored.clone());
        self.crosstab.broadcast_data(DataChange::BookmarksChanged, None);
        Ok(stored)
    }

    /// Deletes a bookmark by id.
    pub async fn delete_bookmark(&self, id: &str) -> Result<(), SyncError> {
        self.delete_bookmark_inner(id).await?;
        if !self.offline() {
            self.crosstab.broadcast_data(DataChange::BookmarksChanged, None);
        }
        Ok(())
    }

    /// Deletes a batch of bookmarks (multi-select). Already-deleted rows
    /// stay deleted when a later row fails.
    pub async fn delete_bookmarks(&self, ids: &[String]) -> Result<(), SyncError> {
        for id in ids {
            self.delete_bookmark_inner(id).await?;
        }
        if !self.offline() {
            self.crosstab.broadcast_data(DataChange::BookmarksChanged, None);
        }
        Ok(())
    }

    async fn delete_bookmark_inner(&self, id: &str) -> Result<(), SyncError> {
        if self.offline() {
            let mut rows = self.cache.offline_bookmarks();
            let before = rows.len();
            rows.retain(|b| b.id != id);
            if rows.len() == before {
                return Err(SyncError::NotFound(id.to_string()));
            }
            self.cache.put_offline_bookmarks(&rows);
            self.state.remove_bookmark(id);
            return Ok(());
        }

        let user_id = self.user_id()?;
        self.remote
            .delete_bookmark(&user_id, id)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.remove_bookmark(id);
        Ok(())
    }

    /// Moves a batch of bookmarks into a group, or to ungrouped when
    /// `target_group` is `None`.
    pub async fn move_bookmarks(
        &self,
        ids: &[String],
        target_group: Option<&str>,
    ) -> Result<(), SyncError> {
        if let Some(gid) = target_group {
            if !self.group_exists(gid) {
                return Err(SyncError::GroupNotFound(gid.to_string()));
            }
        }

        if self.offline() {
            let mut rows = self.cache.offline_bookmarks();
            for bookmark in rows.iter_mut() {
                if ids.iter().any(|id| id == &bookmark.id) {
                    bookmark.group_id = target_group.map(str::to_string);
                }
            }
            self.cache.put_offline_bookmarks(&rows);
            self.state.set_bookmarks(rows);
            return Ok(());
        }

        let user_id = self.user_id()?;
        for id in ids {
            let mut bookmark = self
                .state
                .find_bookmark(id)
                .ok_or_else(|| SyncError::NotFound(id.clone()))?;
            bookmark.group_id = target_group.map(str::to_string);
            let stored = self
                .remote
                .update_bookmark(&user_id, &bookmark)
                .await
                .map_err(|e| SyncError::RemoteError(e.to_string()))?;
            self.state.upsert_bookmark(stored);
        }
        self.crosstab.broadcast_data(DataChange::BookmarksChanged, None);
        Ok(())
    }

    /// Case-insensitive substring search over title/content/url, optionally
    /// restricted to one group. Remote-side when online, local scan over
    /// the snapshot when offline.
    pub async fn search(
        &self,
        term: &str,
        group_id: Option<&str>,
    ) -> Result<Vec<Bookmark>, SyncError> {
        if self.offline() {
            let needle = term.to_lowercase();
            let rows = self
                .cache
                .offline_bookmarks()
                .into_iter()
                .filter(|b| group_id.is_none() || b.group_id.as_deref() == group_id)
                .filter(|b| {
                    b.title.to_lowercase().contains(&needle)
                        || b.payload.content_text().to_lowercase().contains(&needle)
                })
                .collect();
            return Ok(rows);
        }
        let user_id = self.user_id()?;
        self.remote
            .search_bookmarks(&user_id, group_id, term)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))
    }

    // === group CRUD ===

    pub async fn create_group(
        &self,
        name: &str,
        color: Option<String>,
    ) -> Result<Group, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::EmptyContent);
        }
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color,
            created_at: now_ms(),
        };

        if self.offline() {
            let mut rows = self.cache.offline_groups();
            rows.push(group.clone());
            self.cache.put_offline_groups(&rows);
            self.state.upsert_group(group.clone());
            return Ok(group);
        }

        let user_id = self.user_id()?;
        let stored = self
            .remote
            .create_group(&user_id, &group)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.upsert_group(stored.clone());
        self.crosstab.broadcast_data(DataChange::GroupsChanged, None);
        Ok(stored)
    }

    /// Renames a group and/or sets its explicit color.
    pub async fn update_group(
        &self,
        id: &str,
        name: Option<&str>,
        color: Option<String>,
    ) -> Result<Group, SyncError> {
        let mut group = self
            .find_existing_group(id)
            .ok_or_else(|| SyncError::GroupNotFound(id.to_string()))?;
        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(SyncError::EmptyContent);
            }
            group.name = name.to_string();
        }
        if let Some(color) = color {
            group.color = Some(color);
        }

        if self.offline() {
            let mut rows = self.cache.offline_groups();
            if let Some(slot) = rows.iter_mut().find(|g| g.id == id) {
                *slot = group.clone();
            }
            self.cache.put_offline_groups(&rows);
            self.state.upsert_group(group.clone());
            return Ok(group);
        }

        let user_id = self.user_id()?;
        let stored = self
            .remote
            .update_group(&user_id, &group)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.upsert_group(stored.clone());
        self.crosstab.broadcast_data(DataChange::GroupsChanged, None);
        Ok(stored)
    }

    /// Deletes a group. Dependent bookmarks keep existing with their group
    /// reference cleared, and the group's cached color override is pruned.
    pub async fn delete_group(&self, id: &str) -> Result<(), SyncError> {
        if self.offline() {
            let mut groups = self.cache.offline_groups();
            let before = groups.len();
            groups.retain(|g| g.id != id);
            if groups.len() == before {
                return Err(SyncError::GroupNotFound(id.to_string()));
            }
            self.cache.put_offline_groups(&groups);

            let mut bookmarks = self.cache.offline_bookmarks();
            for bookmark in bookmarks.iter_mut() {
                if bookmark.group_id.as_deref() == Some(id) {
                    bookmark.group_id = None;
                }
            }
            self.cache.put_offline_bookmarks(&bookmarks);

            self.state.remove_group(id);
            self.state.clear_group_refs(id);
            self.cache.remove_group_color(id);
            return Ok(());
        }

        let user_id = self.user_id()?;
        self.remote
            .delete_group(&user_id, id)
            .await
            .map_err(|e| SyncError::RemoteError(e.to_string()))?;
        self.state.remove_group(id);
        self.state.clear_group_refs(id);
        self.cache.remove_group_color(id);
        self.crosstab.broadcast_data(DataChange::GroupsChanged, None);
        Ok(())
    }

    // === group colors ===

    /// Persists a local display-color override for a group and notifies
    /// other tabs.
    pub fn set_group_color_override(&self, group_id: &str, color: &str) {
        self.cache.set_group_color(group_id, color);
        self.crosstab.broadcast_data(
            DataChange::GroupColorsChanged,
            Some(serde_json::json!({ "group_id": group_id, "color": color })),
        );
    }

    /// Resolves the color a group should render with (override, explicit,
    /// derived).
    pub fn group_display_color(&self, group: &Group) -> String {
        group.display_color(&self.cache.group_color_overrides())
    }

    // === offline mode ===

    /// Toggles offline mode. The offline snapshot is deliberately left
    /// intact when turning offline mode off: offline and online bookmarks
    /// are separate spaces, never merged, and re-enabling offline mode
    /// finds the snapshot again.
    pub fn set_offline(&self, enabled: bool) {
        self.cache.set_offline_enabled(enabled);
    }

    pub fn is_offline(&self) -> bool {
        self.offline()
    }

    // === deep-link intake ===

    /// Applies a launch intent: a stored (unexpired) payload wins over the
    /// live query params. Resolves the group reference by id or
    /// case-insensitive name against the loaded groups.
    pub fn apply_launch_params(&self, live: Option<LaunchParams>) -> Option<ComposePrefill> {
        let stored = self
            .cache
            .take_pending_bookmark()
            .map(PendingBookmarkPayload::into_params);
        let params = stored.or(live)?;
        if !params.has_payload() {
            return None;
        }
        let group_id = params.group.as_deref().and_then(|g| self.resolve_group_ref(g));
        let open_modal = params.open_modal
            || params.content.is_some()
            || params.title.is_some()
            || params.group.is_some();
        Some(ComposePrefill {
            content: params.content,
            title: params.title,
            group_id,
            open_modal,
        })
    }

    fn resolve_group_ref(&self, reference: &str) -> Option<String> {
        self.state
            .groups()
            .iter()
            .find(|g| g.id == reference || g.name.eq_ignore_ascii_case(reference))
            .map(|g| g.id.clone())
    }

    // === helpers ===

    async fn resolve_draft_title(
        &self,
        draft: &BookmarkDraft,
        classified: &ClassifiedContent,
    ) -> Result<String, SyncError> {
        if let Some(title) = draft
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return Ok(title.to_string());
        }
        let resolved = if self.offline() {
            TitleResolver::fallback_title(classified)
        } else {
            self.titles.resolve_title(classified).await
        };
        resolved.ok_or(SyncError::TitleRequired)
    }

    fn group_exists(&self, id: &str) -> bool {
        if self.offline() {
            self.cache.offline_groups().iter().any(|g| g.id == id)
        } else {
            self.state.has_group(id)
        }
    }

    fn find_existing(&self, id: &str) -> Option<Bookmark> {
        if self.offline() {
            self.cache.offline_bookmarks().into_iter().find(|b| b.id == id)
        } else {
            self.state.find_bookmark(id)
        }
    }

    fn find_existing_group(&self, id: &str) -> Option<Group> {
        if self.offline() {
            self.cache.offline_groups().into_iter().find(|g| g.id == id)
        } else {
            self.state.groups().into_iter().find(|g| g.id == id)
        }
    }
}

/// Builds the typed payload for a classified draft.
fn build_payload(classified: &ClassifiedContent, content: &str) -> BookmarkPayload {
    match classified {
        ClassifiedContent::Color { value } => BookmarkPayload::Color { hex: value.clone() },
        ClassifiedContent::Link { url, .. } => BookmarkPayload::Link {
            url: url.clone(),
            favicon: resolve_favicon_url(url),
        },
        ClassifiedContent::Image { url, .. } => BookmarkPayload::Image {
            url: url.clone(),
            average_color: None,
            width: None,
            height: None,
            note: None,
        },
        ClassifiedContent::Text { .. } => BookmarkPayload::Text {
            content: content.to_string(),
        },
    }
}
