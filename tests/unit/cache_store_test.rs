//! Unit tests for the local cache store.
//!
//! The cache must tolerate missing keys, recover from corrupt values, and
//! enforce the deep-link payload TTL, all without surfacing errors to the
//! caller.

use std::sync::Arc;

use bmarks::database::Database;
use bmarks::services::cache_store::{
    CacheStore, KEY_PENDING_BOOKMARK, KEY_SESSION, PENDING_BOOKMARK_TTL_MS,
};
use bmarks::types::bookmark::{Bookmark, BookmarkPayload};
use bmarks::types::group::Group;
use bmarks::types::launch::{LaunchParams, PendingBookmarkPayload};
use bmarks::types::session::CachedTokens;

fn setup() -> (Arc<Database>, CacheStore) {
    let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
    let cache = CacheStore::new(Arc::clone(&db));
    (db, cache)
}

fn sample_bookmark(id: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        group_id: None,
        title: "Example".to_string(),
        created_at: 1_000,
        payload: BookmarkPayload::Link {
            url: "https://example.com/".to_string(),
            favicon: None,
        },
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[test]
fn test_missing_keys_read_as_absent() {
    let (_db, cache) = setup();
    assert!(cache.cached_tokens().is_none());
    assert!(!cache.offline_enabled());
    assert!(cache.offline_bookmarks().is_empty());
    assert!(cache.offline_groups().is_empty());
    assert!(cache.group_color_overrides().is_empty());
    assert!(cache.take_pending_bookmark().is_none());
}

#[test]
fn test_token_pair_roundtrip_and_clear() {
    let (_db, cache) = setup();
    let tokens = CachedTokens {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
    };
    cache.cache_tokens(&tokens);
    assert_eq!(cache.cached_tokens(), Some(tokens));

    cache.clear_cached_tokens();
    assert!(cache.cached_tokens().is_none());
}

#[test]
fn test_corrupt_value_reads_as_absent_and_is_removed() {
    let (db, cache) = setup();

    // Plant a corrupt JSON value under the session key.
    db.connection()
        .execute(
            "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite_params(KEY_SESSION, "{not valid json", 1),
        )
        .expect("raw insert");

    assert!(cache.cached_tokens().is_none());

    // The corrupt entry was dropped; the key is truly gone now.
    let remaining: i64 = db
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM kv_cache WHERE key = ?1",
            [KEY_SESSION],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(remaining, 0);
}

#[test]
fn test_offline_snapshot_roundtrip() {
    let (_db, cache) = setup();

    cache.set_offline_enabled(true);
    assert!(cache.offline_enabled());

    let bookmarks = vec![sample_bookmark("b1"), sample_bookmark("b2")];
    cache.put_offline_bookmarks(&bookmarks);
    assert_eq!(cache.offline_bookmarks(), bookmarks);

    let groups = vec![Group {
        id: "g1".to_string(),
        name: "Work".to_string(),
        color: None,
        created_at: 1,
    }];
    cache.put_offline_groups(&groups);
    assert_eq!(cache.offline_groups(), groups);

    // Disabling offline mode leaves the snapshot intact.
    cache.set_offline_enabled(false);
    assert_eq!(cache.offline_bookmarks().len(), 2);
    assert_eq!(cache.offline_groups().len(), 1);
}

#[test]
fn test_group_color_overrides_set_and_prune() {
    let (_db, cache) = setup();

    cache.set_group_color("g1", "#112233");
    cache.set_group_color("g2", "#445566");
    let overrides = cache.group_color_overrides();
    assert_eq!(overrides.get("g1").map(String::as_str), Some("#112233"));
    assert_eq!(overrides.len(), 2);

    cache.remove_group_color("g1");
    let overrides = cache.group_color_overrides();
    assert!(!overrides.contains_key("g1"));
    assert!(overrides.contains_key("g2"));
}

#[test]
fn test_pending_payload_is_consumed_by_read() {
    let (_db, cache) = setup();
    let params = LaunchParams {
        content: Some("https://example.com".to_string()),
        title: None,
        group: None,
        open_modal: true,
    };
    cache.store_pending_bookmark(&PendingBookmarkPayload::from_params(&params, now_ms()));

    let first = cache.take_pending_bookmark();
    assert!(first.is_some());
    assert_eq!(
        first.unwrap().content.as_deref(),
        Some("https://example.com")
    );

    // Consumed: a second read finds nothing.
    assert!(cache.take_pending_bookmark().is_none());
}

#[test]
fn test_pending_payload_older_than_ttl_is_discarded() {
    let (_db, cache) = setup();
    let params = LaunchParams {
        content: Some("stale".to_string()),
        title: None,
        group: None,
        open_modal: false,
    };
    // Stored eleven minutes ago, one minute past the TTL.
    let stored_at = now_ms() - PENDING_BOOKMARK_TTL_MS - 60_000;
    cache.store_pending_bookmark(&PendingBookmarkPayload::from_params(&params, stored_at));

    assert!(cache.take_pending_bookmark().is_none());
}

#[test]
fn test_cache_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cache.db");
    {
        let db = Arc::new(Database::open(&path).expect("open file-backed database"));
        let cache = CacheStore::new(db);
        cache.set_offline_enabled(true);
        cache.set_group_color("g1", "#abcdef");
    }

    // A fresh store over the same file sees the persisted state.
    let db = Arc::new(Database::open(&path).expect("reopen file-backed database"));
    let cache = CacheStore::new(db);
    assert!(cache.offline_enabled());
    assert_eq!(
        cache.group_color_overrides().get("g1").map(String::as_str),
        Some("#abcdef")
    );
}

#[test]
fn test_corrupt_pending_payload_is_discarded() {
    let (db, cache) = setup();
    db.connection()
        .execute(
            "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite_params(KEY_PENDING_BOOKMARK, "[1,2,", 1),
        )
        .expect("raw insert");

    assert!(cache.take_pending_bookmark().is_none());
}

/// Helper building positional params for raw kv writes.
fn rusqlite_params<'a>(
    key: &'a str,
    value: &'a str,
    updated_at: i64,
) -> (&'a str, &'a str, i64) {
    (key, value, updated_at)
}
