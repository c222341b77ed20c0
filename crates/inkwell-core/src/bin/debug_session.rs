//! Drives a session against an in-memory store and prints what a
//! presentation layer would see.
//!
//! Usage: debug_session [config.json]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use inkwell_core::models::RelationshipKind;
use inkwell_core::remote::RemoteOp;
use inkwell_core::tracing_setup::init_tracing;
use inkwell_core::{CoreConfig, CoreEvent, MemoryStore, RemoteError, Session};
use serde_json::json;
use uuid::Uuid;

fn seeded_store(me: &str) -> MemoryStore {
    let ago = |mins: i64| (Utc::now() - ChronoDuration::minutes(mins)).to_rfc3339();
    let ada = Uuid::new_v4().to_string();

    let store = MemoryStore::new()
        .with_unique("bookmarks", &["user_id", "post_id"])
        .with_unique("likes", &["user_id", "post_id"]);
    store.seed(
        "profiles",
        [
            json!({"id": me, "username": "debugger", "created_at": ago(600)}),
            json!({"id": ada, "username": "ada", "full_name": "Ada Lovelace", "created_at": ago(90)}),
        ],
    );
    store.seed(
        "posts",
        [
            json!({"id": "p1", "author_id": ada, "title": "Notes on the engine", "content": "word ".repeat(640), "created_at": ago(60), "author": {"full_name": "Ada Lovelace"}}),
            json!({"id": "p2", "author_id": me, "title": "Async Rust in practice", "content": "tokio spawn join", "created_at": ago(30)}),
        ],
    );
    store.seed(
        "comments",
        [json!({"id": "c1", "post_id": "p2", "author_id": ada, "content": "Great write-up on async Rust!", "created_at": ago(20), "author": {"username": "ada"}})],
    );
    store.seed(
        "likes",
        [json!({"id": "l1", "user_id": ada, "post_id": "p2", "created_at": ago(15), "user": {"full_name": "Ada Lovelace"}, "post": {"title": "Async Rust in practice"}})],
    );
    store.seed(
        "notices",
        [json!({"id": "n1", "title": "Maintenance", "message": "Database upgrade tonight", "read": false, "created_at": ago(5)})],
    );
    store
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    eprintln!("=== Session Debugger ===\n{}\n", config.to_json()?);

    let me = Uuid::new_v4().to_string();
    let store = Arc::new(seeded_store(&me));
    store.set_latency(Duration::from_millis(25));
    let mut session = Session::new(config, store.clone(), me.as_str());
    let mut events = session.subscribe();

    // Relationships
    let targets = vec!["p1".to_string(), "p2".to_string()];
    let written = session.prefetch(RelationshipKind::Like, &targets).await?;
    eprintln!("Prefetched {} like entries", written);

    let pending = session.toggle(RelationshipKind::Bookmark, "p1");
    eprintln!("Optimistic bookmark on p1: {:?}", session.entry(RelationshipKind::Bookmark, "p1"));
    eprintln!("Settled: {:?}", pending.await?);

    store.fail_next(RemoteOp::Insert, "likes", RemoteError::network("simulated outage"));
    match session.toggle(RelationshipKind::Like, "p1").await {
        Ok(outcome) => eprintln!("Like unexpectedly settled: {:?}", outcome),
        Err(e) => eprintln!("Like failed and rolled back: {} -> {:?}", e, session.entry(RelationshipKind::Like, "p1")),
    }

    // Feed
    let report = session.open_feed().await;
    eprintln!(
        "\nFeed generation {} ({} events, {} failed sources, {} unread)",
        report.generation,
        report.event_count,
        report.failures.len(),
        session.unread_count()
    );
    for event in session.activity_feed() {
        eprintln!(
            "  [{}] {} {} | {}",
            if event.read { " " } else { "*" },
            event.created_at.format("%H:%M"),
            event.title,
            event.message
        );
    }
    let receipt = session.mark_all_read();
    eprintln!("Marked {} read", receipt.marked);
    receipt.persisted().await?;

    // Search
    session.search_input("as");
    session.search_input("async + rust");
    let mut results = session.subscribe_search();
    results.changed().await?;
    let latest = session.search_results();
    eprintln!("\nSearch '{}' (seq {}):", latest.query, latest.seq);
    for hit in &latest.hits {
        eprintln!(
            "  {:?} {} {}",
            hit.entity_type,
            hit.display_text,
            hit.subtitle.as_deref().unwrap_or("")
        );
    }

    let mut relationship_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::RelationshipChanged { .. }) {
            relationship_events += 1;
        }
    }
    eprintln!("\n{} relationship change notifications", relationship_events);

    session.shutdown();
    Ok(())
}
