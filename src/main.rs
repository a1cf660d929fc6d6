//! BMarks — the client-side data-consistency engine of a personal bookmark manager.
//!
//! Entry point: runs an interactive console demo of the engine against the
//! in-memory backend. A real host embeds the library crate instead.

use std::sync::Arc;

use bmarks::app::{Engine, EngineConfig};
use bmarks::database::Database;
use bmarks::remote::identity::LocalIdentityProvider;
use bmarks::remote::memory::InMemoryRemote;
use bmarks::services::content_classifier::classify;
use bmarks::services::crosstab::BroadcastHub;
use bmarks::types::bookmark::BookmarkDraft;
use bmarks::types::session::Session;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 BMarks Engine v{} — Demo Mode             ║", env!("CARGO_PKG_VERSION"));
    println!("║        Bookmark sync engine running on local fakes           ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    demo_classifier();
    demo_engine().await;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  ✅ Engine demo finished.");
    println!("═══════════════════════════════════════════════════════════════");
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn demo_classifier() {
    section("Content Classifier");
    for sample in ["#ff5733", "rgb(12, 34, 56)", "example.com/post", "buy milk tomorrow"] {
        let classified = classify(sample);
        println!("  {:28} -> {}", sample, classified.kind());
    }
    println!();
}

async fn demo_engine() {
    section("Engine Lifecycle");

    let db = Arc::new(Database::open_in_memory().expect("failed to open in-memory database"));
    let provider = Arc::new(LocalIdentityProvider::with_session(Session {
        user_id: "demo-user".to_string(),
        access_token: "demo-access".to_string(),
        refresh_token: "demo-refresh".to_string(),
        expires_approx: 0,
    }));
    let remote = Arc::new(InMemoryRemote::new());
    let hub = BroadcastHub::new();

    let (engine, _prefill) = Engine::start(
        EngineConfig::default(),
        db,
        provider,
        remote,
        &hub,
        None,
    )
    .await;

    println!("  session state: {:?}", engine.session().state().is_active());

    let store = engine.store();
    let group = store
        .create_group("Reading", None)
        .await
        .expect("failed to create group");
    println!("  created group '{}' ({})", group.name, group.id);
    println!("  display color: {}", store.group_display_color(&group));

    let link = store
        .create_bookmark(
            BookmarkDraft::new("rust-lang.org")
                .with_title("Rust")
                .with_group(group.id.clone()),
        )
        .await
        .expect("failed to create link bookmark");
    println!("  created {} bookmark '{}'", link.payload.kind(), link.title);

    let color = store
        .create_bookmark(BookmarkDraft::new("#663399"))
        .await
        .expect("failed to create color bookmark");
    println!("  created {} bookmark '{}'", color.payload.kind(), color.title);

    store
        .delete_group(&group.id)
        .await
        .expect("failed to delete group");
    let orphaned = store.state().find_bookmark(&link.id).expect("bookmark kept");
    println!(
        "  deleted group; bookmark kept with group cleared: {:?}",
        orphaned.group_id
    );

    store.set_offline(true);
    let offline = store
        .create_bookmark(BookmarkDraft::new("note to self").with_title("Note"))
        .await
        .expect("failed to create offline bookmark");
    println!("  offline bookmark '{}' stored locally", offline.title);
    store.set_offline(false);

    engine.shutdown();
    println!();
}
