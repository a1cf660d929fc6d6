//! Local cache store for BMarks.
//!
//! Key/value persistence over the SQLite cache table, with independent
//! namespaces for the session token pair, offline snapshots, group color
//! overrides and the pending deep-link payload. All reads tolerate missing
//! keys and corrupt values (a corrupt entry is logged, removed and treated
//! as absent); writes are best-effort and never surface an error to the
//! caller, since every cached feature degrades gracefully to "as if
//! nothing had been saved".

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::database::Database;
use crate::time_utils::now_ms;
use crate::types::bookmark::Bookmark;
use crate::types::group::Group;
use crate::types::launch::PendingBookmarkPayload;
use crate::types::session::CachedTokens;

pub const KEY_SESSION: &str = "bmarks.session";
pub const KEY_OFFLINE_ENABLED: &str = "bmarks.offline.enabled";
pub const KEY_OFFLINE_BOOKMARKS: &str = "bmarks.offline.bookmarks";
pub const KEY_OFFLINE_GROUPS: &str = "bmarks.offline.groups";
pub const KEY_GROUP_COLORS: &str = "bmarks.groupColors";
pub const KEY_PENDING_BOOKMARK: &str = "bmarks.pendingBookmark";

/// TTL for the pending deep-link payload.
pub const PENDING_BOOKMARK_TTL_MS: i64 = 1000 * 60 * 10;

/// Typed accessors over the persistent key/value cache.
pub struct CacheStore {
    db: Arc<Database>,
}

impl CacheStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // === session cache ===

    /// The cached token pair, if present and readable.
    pub fn cached_tokens(&self) -> Option<CachedTokens> {
        self.read_json(KEY_SESSION)
    }

    pub fn cache_tokens(&self, tokens: &CachedTokens) {
        self.write_json(KEY_SESSION, tokens);
    }

    pub fn clear_cached_tokens(&self) {
        self.remove_raw(KEY_SESSION);
    }

    // === offline mode ===

    pub fn offline_enabled(&self) -> bool {
        self.read_json::<bool>(KEY_OFFLINE_ENABLED).unwrap_or(false)
    }

    pub fn set_offline_enabled(&self, enabled: bool) {
        self.write_json(KEY_OFFLINE_ENABLED, &enabled);
    }

    pub fn offline_bookmarks(&self) -> Vec<Bookmark> {
        self.read_json(KEY_OFFLINE_BOOKMARKS).unwrap_or_default()
    }

    pub fn put_offline_bookmarks(&self, bookmarks: &[Bookmark]) {
        self.write_json(KEY_OFFLINE_BOOKMARKS, &bookmarks);
    }

    pub fn offline_groups(&self) -> Vec<Group> {
        self.read_json(KEY_OFFLINE_GROUPS).unwrap_or_default()
    }

    pub fn put_offline_groups(&self, groups: &[Group]) {
        self.write_json(KEY_OFFLINE_GROUPS, &groups);
    }

    // === group color overrides ===

    pub fn group_color_overrides(&self) -> HashMap<String, String> {
        self.read_json(KEY_GROUP_COLORS).unwrap_or_default()
    }

    pub fn set_group_color(&self, group_id: &str, color: &str) {
        let mut overrides = self.group_color_overrides();
        overrides.insert(group_id.to_string(), color.to_string());
        self.write_json(KEY_GROUP_COLORS, &overrides);
    }

    /// Removes the override for a group. Called when the group is deleted.
    pub fn remove_group_color(&self, group_id: &str) {
        let mut overrides = self.group_color_overrides();
        if overrides.remove(group_id).is_some() {
            self.write_json(KEY_GROUP_COLORS, &overrides);
        }
    }

    // === pending deep-link payload ===

    pub fn store_pending_bookmark(&self, payload: &PendingBookmarkPayload) {
        self.write_json(KEY_PENDING_BOOKMARK, payload);
    }

    /// Consumes the pending payload: the entry is removed by the read.
    /// Entries older than the TTL are discarded even when present.
    pub fn take_pending_bookmark(&self) -> Option<PendingBookmarkPayload> {
        let payload: Option<PendingBookmarkPayload> = self.read_json(KEY_PENDING_BOOKMARK);
        self.remove_raw(KEY_PENDING_BOOKMARK);
        let payload = payload?;
        if payload.is_expired(now_ms(), PENDING_BOOKMARK_TTL_MS) {
            return None;
        }
        Some(payload)
    }

    // === raw key/value plumbing ===

    fn read_raw(&self, key: &str) -> Option<String> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT value FROM kv_cache WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Some(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                warn!("Unable to read cache key {}: {}", key, e);
                None
            }
        }
    }

    fn write_raw(&self, key: &str, value: &str) {
        let conn = self.db.connection();
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now_ms()],
        ) {
            warn!("Unable to write cache key {}: {}", key, e);
        }
    }

    fn remove_raw(&self, key: &str) {
        let conn = self.db.connection();
        if let Err(e) = conn.execute("DELETE FROM kv_cache WHERE key = ?1", params![key]) {
            warn!("Unable to remove cache key {}: {}", key, e);
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                // Corrupt entries are dropped so the next read starts clean.
                warn!("Discarding corrupt cache entry {}: {}", key, e);
                self.remove_raw(key);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.write_raw(key, &json),
            Err(e) => warn!("Unable to serialize cache value {}: {}", key, e),
        }
    }
}
