use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::events::{CoreEvent, EventBus};
use crate::feed::{ActivityAggregator, ReadReceipt, RefreshReport};
use crate::models::{Event, RelationshipKind};
use crate::mutation::{MutationEngine, PendingToggle};
use crate::remote::RemoteDataService;
use crate::search::{DebouncedSearch, SearchDispatcher, SearchReport, SearchResults};
use crate::store::{CacheEntry, RelationshipCache};

/// Everything one signed-in session needs, built once and handed to every
/// presentation-layer consumer.
///
/// Holds the only relationship cache for the session. Spawning methods must
/// be called within a tokio runtime.
pub struct Session {
    config: CoreConfig,
    bus: EventBus,
    cache: Arc<RelationshipCache>,
    engine: MutationEngine,
    feed: ActivityAggregator,
    dispatcher: Arc<SearchDispatcher>,
    search: DebouncedSearch,
    poller: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        config: CoreConfig,
        remote: Arc<dyn RemoteDataService>,
        actor_id: impl Into<String>,
    ) -> Self {
        let bus = EventBus::new();
        let cache = Arc::new(RelationshipCache::new(remote.clone(), actor_id, bus.clone()));
        let engine = MutationEngine::new(cache.clone(), remote.clone(), &config);
        let feed = ActivityAggregator::new(remote.clone(), &config, bus.clone());
        let dispatcher = Arc::new(SearchDispatcher::new(remote, &config));
        let search = DebouncedSearch::new(dispatcher.clone(), config.search_debounce());

        info!(actor_id = %cache.actor_id(), "session created");

        Self {
            config,
            bus,
            cache,
            engine,
            feed,
            dispatcher,
            search,
            poller: None,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn actor_id(&self) -> &str {
        self.cache.actor_id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.bus.subscribe()
    }

    pub fn cache(&self) -> Arc<RelationshipCache> {
        self.cache.clone()
    }

    pub fn feed(&self) -> ActivityAggregator {
        self.feed.clone()
    }

    // ===== Relationships =====

    pub fn is_member(&self, kind: RelationshipKind, target_id: &str) -> bool {
        self.cache.is_member(kind, target_id)
    }

    pub fn count(&self, kind: RelationshipKind, target_id: &str) -> u64 {
        self.cache.count(kind, target_id)
    }

    pub fn entry(&self, kind: RelationshipKind, target_id: &str) -> CacheEntry {
        self.cache.get(kind, target_id)
    }

    /// Toggle the session actor's relationship to `target_id`
    pub fn toggle(&self, kind: RelationshipKind, target_id: &str) -> PendingToggle {
        self.engine
            .request_toggle(kind, self.cache.actor_id(), target_id)
    }

    pub fn set_relationship(
        &self,
        kind: RelationshipKind,
        target_id: &str,
        desired: bool,
    ) -> Option<PendingToggle> {
        self.engine
            .set_relationship(kind, self.cache.actor_id(), target_id, desired)
    }

    /// Rehydrate the cache for a page of targets
    pub async fn prefetch(
        &self,
        kind: RelationshipKind,
        target_ids: &[String],
    ) -> Result<usize, CoreError> {
        Ok(self.cache.bulk_prefetch(kind, target_ids).await?)
    }

    // ===== Activity feed =====

    pub fn activity_feed(&self) -> Vec<Event> {
        self.feed.activity_feed()
    }

    pub fn unread_count(&self) -> usize {
        self.feed.unread_count()
    }

    pub fn mark_read(&self, event_id: &str) -> ReadReceipt {
        self.feed.mark_read(event_id)
    }

    pub fn mark_all_read(&self) -> ReadReceipt {
        self.feed.mark_all_read()
    }

    pub async fn open_feed(&self) -> RefreshReport {
        self.feed.open().await
    }

    /// Start interval refreshes at the configured rate. No-op if already running.
    pub fn start_polling(&mut self) {
        if self.poller.as_ref().map_or(false, |p| !p.is_finished()) {
            return;
        }
        self.poller = Some(self.feed.spawn_polling(self.config.feed_refresh_interval()));
    }

    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().map_or(false, |p| !p.is_finished())
    }

    // ===== Search =====

    /// Feed the search box text; dispatch is debounced
    pub fn search_input(&self, text: &str) {
        self.search.input(text);
    }

    pub fn search_results(&self) -> SearchResults {
        self.search.results()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchResults> {
        self.search.subscribe()
    }

    /// Run a search immediately, bypassing the debouncer
    pub async fn search(&self, query: &str) -> SearchReport {
        self.dispatcher.search_report(query).await
    }

    /// Stop background work and drop session state. In-flight remote calls
    /// are not cancelled; their results land in the cleared stores.
    pub fn shutdown(&mut self) {
        self.stop_polling();
        self.search.cancel();
        self.cache.clear();
        self.feed.clear();
        info!(actor_id = %self.cache.actor_id(), "session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_polling();
        self.search.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteOp};
    use serde_json::json;
    use std::time::Duration;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new().with_unique("bookmarks", &["user_id", "post_id"]);
        store.seed(
            "posts",
            [
                json!({"id": "p1", "author_id": "u2", "title": "Rust lifetimes", "content": "borrowck", "created_at": 100}),
                json!({"id": "p2", "author_id": "u2", "title": "Tokio tips", "content": "spawn", "created_at": 200}),
            ],
        );
        store.seed(
            "bookmarks",
            [json!({"id": "b1", "user_id": "u3", "post_id": "p1", "created_at": 150})],
        );
        store.seed(
            "notices",
            [json!({"id": "n1", "title": "Welcome", "message": "Hello", "read": false, "created_at": 50})],
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_toggle_uses_session_actor() {
        let store = seeded_store();
        let session = Session::new(CoreConfig::default(), store.clone(), "me");

        let targets = vec!["p1".to_string(), "p2".to_string()];
        assert_eq!(
            session
                .prefetch(RelationshipKind::Bookmark, &targets)
                .await
                .unwrap(),
            2
        );
        assert_eq!(session.count(RelationshipKind::Bookmark, "p1"), 1);

        let pending = session.toggle(RelationshipKind::Bookmark, "p1");
        assert!(session.is_member(RelationshipKind::Bookmark, "p1"));
        assert_eq!(session.count(RelationshipKind::Bookmark, "p1"), 2);

        let outcome = pending.await.unwrap();
        assert_eq!(outcome.count, 2);
        assert!(store
            .rows("bookmarks")
            .iter()
            .any(|r| r["user_id"] == "me" && r["post_id"] == "p1"));
    }

    #[tokio::test]
    async fn test_toggle_changes_are_broadcast() {
        let session = Session::new(CoreConfig::default(), seeded_store(), "me");
        let mut rx = session.subscribe();

        session.toggle(RelationshipKind::Like, "p2").await.unwrap();

        match rx.recv().await.unwrap() {
            CoreEvent::RelationshipChanged { entry, .. } => {
                assert!(entry.is_member);
                assert!(entry.is_pending());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_round_trip() {
        let session = Session::new(CoreConfig::default(), seeded_store(), "me");

        let report = session.open_feed().await;
        assert!(report.applied);
        let ids: Vec<_> = session.activity_feed().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new_post:p2", "new_post:p1", "system_notice:n1"]);
        assert_eq!(session.unread_count(), 3);

        session.mark_all_read().persisted().await.unwrap();
        assert_eq!(session.unread_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_through_session() {
        let session = Session::new(CoreConfig::default(), seeded_store(), "me");
        let mut rx = session.subscribe_search();

        session.search_input("tok");
        session.search_input("tokio");
        rx.changed().await.unwrap();

        let results = session.search_results();
        assert_eq!(results.query, "tokio");
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].id, "p2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling_and_clears_state() {
        let store = seeded_store();
        let mut session = Session::new(CoreConfig::default(), store.clone(), "me");

        session.start_polling();
        session.start_polling();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(session.is_polling());
        let queries = store.calls_of(RemoteOp::Query).len();
        assert_eq!(queries, 6, "one refresh despite two start calls");

        session.toggle(RelationshipKind::Follow, "u2").await.unwrap();
        assert!(!session.cache().is_empty());

        session.shutdown();
        assert!(!session.is_polling());
        assert!(session.cache().is_empty());
        assert!(session.activity_feed().is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.calls_of(RemoteOp::Query).len(), queries + 1);
    }
}
