//! Unit tests for the composed bookmark sync store.
//!
//! Exercises the offline/remote branching, optimistic-on-success mutation
//! semantics, the group-deletion cascade, search, deep-link intake, and the
//! explicit offline/online separation policy.

use std::sync::Arc;
use std::time::Duration;

use bmarks::app::EngineConfig;
use bmarks::database::Database;
use bmarks::managers::session_manager::SessionManager;
use bmarks::managers::sync_store::BookmarkSyncStore;
use bmarks::remote::identity::LocalIdentityProvider;
use bmarks::remote::memory::InMemoryRemote;
use bmarks::services::cache_store::CacheStore;
use bmarks::services::crosstab::{BroadcastHub, CrosstabCoordinator};
use bmarks::types::bookmark::{BookmarkDraft, BookmarkPayload};
use bmarks::types::errors::SyncError;
use bmarks::types::events::{DataChange, TabMessageBody};
use bmarks::types::launch::{LaunchParams, PendingBookmarkPayload};
use bmarks::types::session::Session;

const USER: &str = "u1";

struct Harness {
    remote: Arc<InMemoryRemote>,
    cache: Arc<CacheStore>,
    store: Arc<BookmarkSyncStore>,
    hub: BroadcastHub,
}

fn test_session() -> Session {
    Session {
        user_id: USER.to_string(),
        access_token: "tok".to_string(),
        refresh_token: "tok-refresh".to_string(),
        expires_approx: 0,
    }
}

async fn setup() -> Harness {
    let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
    let cache = Arc::new(CacheStore::new(Arc::clone(&db)));
    let hub = BroadcastHub::new();
    let crosstab = Arc::new(CrosstabCoordinator::new(&hub));
    let provider: Arc<dyn bmarks::remote::IdentityProvider> =
        Arc::new(LocalIdentityProvider::with_session(test_session()));
    let session = Arc::new(SessionManager::new(
        provider,
        Arc::clone(&cache),
        Arc::clone(&crosstab),
        Duration::from_millis(100),
        Duration::from_millis(100),
    ));
    session.ensure_session(None).await.expect("session resolves");

    let remote = Arc::new(InMemoryRemote::new());
    let remote_dyn: Arc<dyn bmarks::remote::RemoteCollections> = remote.clone();
    let store = Arc::new(BookmarkSyncStore::new(
        remote_dyn,
        Arc::clone(&cache),
        crosstab,
        session,
        &EngineConfig::default(),
    ));
    Harness {
        remote,
        cache,
        store,
        hub,
    }
}

#[tokio::test]
async fn test_fetch_all_loads_both_collections_sorted() {
    let h = setup().await;
    h.store
        .create_group("beta", None)
        .await
        .expect("create group");
    h.store
        .create_group("Alpha", None)
        .await
        .expect("create group");
    h.store
        .create_bookmark(BookmarkDraft::new("first note").with_title("Old"))
        .await
        .expect("create bookmark");
    h.store
        .create_bookmark(BookmarkDraft::new("#abc"))
        .await
        .expect("create bookmark");

    // Reload from the remote and verify ordering.
    h.store.fetch_all().await.expect("fetch all");
    let state = h.store.state();
    let names: Vec<String> = state.groups().iter().map(|g| g.name.clone()).collect();
    assert_eq!(names, vec!["Alpha", "beta"]);
    let bookmarks = state.bookmarks();
    assert_eq!(bookmarks.len(), 2);
    assert!(bookmarks[0].created_at >= bookmarks[1].created_at);
}

#[tokio::test]
async fn test_create_classifies_and_notifies_other_tabs() {
    let h = setup().await;
    let mut rx = h.hub.subscribe();

    let created = h.store
        .create_bookmark(BookmarkDraft::new("example.com").with_title("Example"))
        .await
        .expect("create");
    match &created.payload {
        BookmarkPayload::Link { url, favicon } => {
            assert!(url.starts_with("https://example.com"));
            assert_eq!(favicon.as_deref(), Some("https://example.com/favicon.ico"));
        }
        other => panic!("expected link payload, got {:?}", other),
    }

    // Other tabs are told bookmarks changed.
    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("broadcast arrives")
        .expect("message");
    match message.body {
        TabMessageBody::Data { change, .. } => assert_eq!(change, DataChange::BookmarksChanged),
        other => panic!("expected data message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_color_bookmark_title_defaults_to_color_code() {
    let h = setup().await;
    let created = h.store
        .create_bookmark(BookmarkDraft::new("#ff5733"))
        .await
        .expect("create");
    assert_eq!(created.title, "#ff5733");
    assert!(matches!(created.payload, BookmarkPayload::Color { .. }));
}

#[tokio::test]
async fn test_plain_text_without_title_is_a_validation_failure() {
    let h = setup().await;
    let result = h.store
        .create_bookmark(BookmarkDraft::new("remember the milk run"))
        .await;
    assert!(matches!(result, Err(SyncError::TitleRequired)));
    // Nothing was applied anywhere.
    assert!(h.store.state().bookmarks().is_empty());
}

#[tokio::test]
async fn test_failed_remote_mutation_leaves_state_untouched() {
    let h = setup().await;
    h.remote.set_fail_requests(true);

    let result = h.store
        .create_bookmark(BookmarkDraft::new("#123456"))
        .await;
    assert!(matches!(result, Err(SyncError::RemoteError(_))));
    assert!(h.store.state().bookmarks().is_empty());

    h.remote.set_fail_requests(false);
}

#[tokio::test]
async fn test_update_rewrites_payload_and_keeps_identity() {
    let h = setup().await;
    let created = h.store
        .create_bookmark(BookmarkDraft::new("note body").with_title("Note"))
        .await
        .expect("create");

    let updated = h.store
        .update_bookmark(&created.id, BookmarkDraft::new("#00ff00"))
        .await
        .expect("update");
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert!(matches!(updated.payload, BookmarkPayload::Color { .. }));
}

#[tokio::test]
async fn test_delete_clears_matching_edit_marker() {
    let h = setup().await;
    let created = h.store
        .create_bookmark(BookmarkDraft::new("#abcdef"))
        .await
        .expect("create");
    h.store.state().set_editing_bookmark(Some(created.id.clone()));

    h.store.delete_bookmark(&created.id).await.expect("delete");
    assert!(h.store.state().bookmarks().is_empty());
    assert!(h.store.state().editing_bookmark_id().is_none());
}

#[tokio::test]
async fn test_move_bookmarks_sets_and_clears_group() {
    let h = setup().await;
    let group = h.store.create_group("Work", None).await.expect("group");
    let a = h.store
        .create_bookmark(BookmarkDraft::new("#111111"))
        .await
        .expect("a");
    let b = h.store
        .create_bookmark(BookmarkDraft::new("#222222"))
        .await
        .expect("b");

    let ids = vec![a.id.clone(), b.id.clone()];
    h.store
        .move_bookmarks(&ids, Some(&group.id))
        .await
        .expect("move into group");
    for id in &ids {
        let row = h.store.state().find_bookmark(id).expect("bookmark");
        assert_eq!(row.group_id.as_deref(), Some(group.id.as_str()));
    }

    h.store
        .move_bookmarks(&ids, None)
        .await
        .expect("move to ungrouped");
    for id in &ids {
        let row = h.store.state().find_bookmark(id).expect("bookmark");
        assert!(row.group_id.is_none());
    }
}

#[tokio::test]
async fn test_move_to_unknown_group_is_rejected() {
    let h = setup().await;
    let a = h.store
        .create_bookmark(BookmarkDraft::new("#111111"))
        .await
        .expect("a");
    let result = h.store
        .move_bookmarks(&[a.id.clone()], Some("missing-group"))
        .await;
    assert!(matches!(result, Err(SyncError::GroupNotFound(_))));
}

#[tokio::test]
async fn test_group_deletion_cascades_by_clearing_references() {
    let h = setup().await;
    let group = h.store.create_group("Work", None).await.expect("group");
    h.store.set_group_color_override(&group.id, "#999999");
    let kept = h.store
        .create_bookmark(BookmarkDraft::new("#333333").with_group(group.id.clone()))
        .await
        .expect("bookmark in group");

    h.store.delete_group(&group.id).await.expect("delete group");

    // The bookmark survives with its group reference cleared.
    let row = h.store.state().find_bookmark(&kept.id).expect("bookmark kept");
    assert!(row.group_id.is_none());
    // The cached color override is pruned.
    assert!(!h.cache.group_color_overrides().contains_key(&group.id));
    // The group itself is gone.
    assert!(!h.store.state().has_group(&group.id));
}

#[tokio::test]
async fn test_offline_crud_never_touches_the_remote() {
    let h = setup().await;
    h.store.set_offline(true);
    let before = h.remote.request_count();

    let group = h.store.create_group("Local", None).await.expect("group");
    let bookmark = h.store
        .create_bookmark(
            BookmarkDraft::new("offline note")
                .with_title("Offline")
                .with_group(group.id.clone()),
        )
        .await
        .expect("create");
    h.store
        .update_bookmark(&bookmark.id, BookmarkDraft::new("#444444"))
        .await
        .expect("update");
    h.store.search("off", None).await.expect("search");
    h.store.delete_group(&group.id).await.expect("delete group");
    h.store.delete_bookmark(&bookmark.id).await.expect("delete");

    assert_eq!(h.remote.request_count(), before);
    h.store.set_offline(false);
}

#[tokio::test]
async fn test_offline_snapshot_persists_and_mirrors_state() {
    let h = setup().await;
    h.store.set_offline(true);

    let created = h.store
        .create_bookmark(BookmarkDraft::new("local note").with_title("Local"))
        .await
        .expect("create");

    // Persisted snapshot and in-memory state agree.
    let snapshot = h.cache.offline_bookmarks();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, created.id);
    assert_eq!(h.store.state().bookmarks().len(), 1);
    h.store.set_offline(false);
}

#[tokio::test]
async fn test_returning_online_keeps_spaces_separate() {
    let h = setup().await;

    // One bookmark created offline, then offline mode turned off.
    h.store.set_offline(true);
    h.store
        .create_bookmark(BookmarkDraft::new("offline only").with_title("Offline"))
        .await
        .expect("offline create");
    h.store.set_offline(false);

    // The offline snapshot stays on disk, and nothing was pushed remotely.
    assert_eq!(h.cache.offline_bookmarks().len(), 1);
    assert_eq!(h.remote.request_count(), 0);

    // The online space loads independently of the snapshot.
    h.store.fetch_all().await.expect("fetch all");
    assert!(h.store.state().bookmarks().is_empty());

    // Re-entering offline mode finds the snapshot again.
    h.store.set_offline(true);
    h.store.fetch_all().await.expect("offline fetch");
    assert_eq!(h.store.state().bookmarks().len(), 1);
    h.store.set_offline(false);
}

#[tokio::test]
async fn test_offline_search_scans_the_snapshot() {
    let h = setup().await;
    h.store.set_offline(true);
    h.store
        .create_bookmark(BookmarkDraft::new("alpha notes").with_title("Alpha"))
        .await
        .expect("a");
    h.store
        .create_bookmark(BookmarkDraft::new("beta notes").with_title("Beta"))
        .await
        .expect("b");

    let hits = h.store.search("ALPHA", None).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Alpha");
    h.store.set_offline(false);
}

#[tokio::test]
async fn test_remote_search_is_user_scoped_substring_match() {
    let h = setup().await;
    h.store
        .create_bookmark(BookmarkDraft::new("rust-lang.org").with_title("Rust homepage"))
        .await
        .expect("create");
    h.store
        .create_bookmark(BookmarkDraft::new("#123abc"))
        .await
        .expect("create");

    let hits = h.store.search("rust", None).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Rust homepage");
}

#[tokio::test]
async fn test_apply_launch_params_resolves_group_by_name() {
    let h = setup().await;
    let group = h.store.create_group("Reading", None).await.expect("group");

    let prefill = h.store
        .apply_launch_params(Some(LaunchParams {
            content: Some("https://example.com".to_string()),
            title: None,
            group: Some("reading".to_string()),
            open_modal: false,
        }))
        .expect("prefill");
    assert_eq!(prefill.group_id.as_deref(), Some(group.id.as_str()));
    assert!(prefill.open_modal, "content implies opening the compose modal");
}

#[tokio::test]
async fn test_stored_payload_wins_over_live_params() {
    let h = setup().await;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    h.cache.store_pending_bookmark(&PendingBookmarkPayload {
        content: Some("stored content".to_string()),
        title: None,
        group: None,
        open_modal: false,
        stored_at: now,
    });

    let prefill = h.store
        .apply_launch_params(Some(LaunchParams {
            content: Some("live content".to_string()),
            title: None,
            group: None,
            open_modal: false,
        }))
        .expect("prefill");
    assert_eq!(prefill.content.as_deref(), Some("stored content"));
}

#[tokio::test]
async fn test_expired_payload_is_not_applied() {
    let h = setup().await;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    h.cache.store_pending_bookmark(&PendingBookmarkPayload {
        content: Some("stale".to_string()),
        title: None,
        group: None,
        open_modal: false,
        // Eleven minutes old, past the ten-minute TTL.
        stored_at: now - 11 * 60 * 1000,
    });

    assert!(h.store.apply_launch_params(None).is_none());
}

#[tokio::test]
async fn test_resync_is_coalesced_through_the_gate() {
    let h = setup().await;
    let before = h.remote.list_call_count();

    // A burst of non-forced triggers runs at most one refetch.
    let first = Arc::clone(&h.store).request_resync(false);
    let second = Arc::clone(&h.store).request_resync(false);
    if let Some(handle) = first {
        handle.await;
    }
    if let Some(handle) = second {
        handle.await;
    }

    // One full refetch lists both collections.
    assert_eq!(h.remote.list_call_count() - before, 2);

    // Within the cooldown, a non-forced request is a no-op.
    assert!(Arc::clone(&h.store).request_resync(false).is_none());
}
