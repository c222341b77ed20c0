//! Optimistic relationship toggles.
//!
//! [`MutationEngine::request_toggle`] flips the cached entry before returning,
//! then confirms the flip against the remote store on a spawned task.
//! Toggles on the same `(kind, target)` are queued and run strictly one after
//! another; different keys proceed independently.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{CoreConfig, ReconcilePolicy};
use crate::error::{CoreError, RemoteError};
use crate::models::{RelationshipKind, RelationshipRecord};
use crate::remote::{Filter, RemoteDataService};
use crate::store::{CacheEntry, CacheKey, RelationshipCache};

/// Settled state of one toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub kind: RelationshipKind,
    pub target_id: String,
    pub is_member: bool,
    pub count: u64,
}

type ToggleResult = Result<ToggleOutcome, CoreError>;

/// Resolves once the toggle has been confirmed or rolled back.
///
/// The optimistic flip does not depend on this being awaited; dropping it
/// only discards the outcome.
pub struct PendingToggle {
    queued: bool,
    rx: oneshot::Receiver<ToggleResult>,
}

impl PendingToggle {
    /// `true` if the toggle waited behind another one on the same key
    /// instead of flipping the cache immediately.
    pub fn was_queued(&self) -> bool {
        self.queued
    }
}

impl Future for PendingToggle {
    type Output = ToggleResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CoreError::ToggleDropped)))
    }
}

struct QueuedToggle {
    actor_id: String,
    reply: oneshot::Sender<ToggleResult>,
}

struct EngineInner {
    cache: Arc<RelationshipCache>,
    remote: Arc<dyn RemoteDataService>,
    reconcile: ReconcilePolicy,
    network_retries: u32,
    /// Keys with a toggle in flight -> toggles waiting behind it
    queues: Mutex<HashMap<CacheKey, VecDeque<QueuedToggle>>>,
}

#[derive(Clone)]
pub struct MutationEngine {
    inner: Arc<EngineInner>,
}

impl MutationEngine {
    pub fn new(
        cache: Arc<RelationshipCache>,
        remote: Arc<dyn RemoteDataService>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                cache,
                remote,
                reconcile: config.count_reconcile,
                network_retries: config.network_retries,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<RelationshipCache> {
        &self.inner.cache
    }

    pub fn is_member(&self, kind: RelationshipKind, target_id: &str) -> bool {
        self.inner.cache.is_member(kind, target_id)
    }

    pub fn count(&self, kind: RelationshipKind, target_id: &str) -> u64 {
        self.inner.cache.count(kind, target_id)
    }

    /// Toggles accepted for this key that have not settled yet (in flight + queued)
    pub fn outstanding(&self, kind: RelationshipKind, target_id: &str) -> usize {
        self.inner
            .queues
            .lock()
            .get(&CacheKey::new(kind, target_id))
            .map_or(0, |waiting| waiting.len() + 1)
    }

    /// Flip `actor_id`'s relationship to `target_id`.
    ///
    /// If no toggle is in flight for the key, the cache is flipped before this
    /// returns. Otherwise the toggle is queued and flips once the earlier ones
    /// settle. Must be called within a tokio runtime.
    pub fn request_toggle(
        &self,
        kind: RelationshipKind,
        actor_id: &str,
        target_id: &str,
    ) -> PendingToggle {
        let key = CacheKey::new(kind, target_id);
        let (reply, rx) = oneshot::channel();
        let toggle = QueuedToggle {
            actor_id: actor_id.to_string(),
            reply,
        };

        let mut queues = self.inner.queues.lock();
        if let Some(waiting) = queues.get_mut(&key) {
            waiting.push_back(toggle);
            debug!(%kind, target_id, queued = waiting.len(), "toggle queued behind in-flight write");
            return PendingToggle { queued: true, rx };
        }

        queues.insert(key.clone(), VecDeque::new());
        let previous = self.inner.cache.begin_toggle(&key);
        drop(queues);

        tokio::spawn(EngineInner::drive(self.inner.clone(), key, toggle, previous));
        PendingToggle { queued: false, rx }
    }

    /// Move the relationship to `desired`, toggling only if the state it will
    /// reach after every outstanding toggle differs. Returns `None` when no
    /// toggle was needed.
    pub fn set_relationship(
        &self,
        kind: RelationshipKind,
        actor_id: &str,
        target_id: &str,
        desired: bool,
    ) -> Option<PendingToggle> {
        let waiting = self
            .inner
            .queues
            .lock()
            .get(&CacheKey::new(kind, target_id))
            .map_or(0, VecDeque::len);
        let projected = self.is_member(kind, target_id) ^ (waiting % 2 == 1);
        if projected == desired {
            return None;
        }
        Some(self.request_toggle(kind, actor_id, target_id))
    }
}

impl EngineInner {
    /// Run toggles for one key until its queue drains
    async fn drive(
        inner: Arc<Self>,
        key: CacheKey,
        mut toggle: QueuedToggle,
        mut previous: CacheEntry,
    ) {
        loop {
            let result = inner.execute(&key, &toggle.actor_id, &previous).await;
            let _ = toggle.reply.send(result);

            let next = {
                let mut queues = inner.queues.lock();
                match queues.get_mut(&key).and_then(VecDeque::pop_front) {
                    Some(next) => {
                        previous = inner.cache.begin_toggle(&key);
                        Some(next)
                    }
                    None => {
                        queues.remove(&key);
                        None
                    }
                }
            };

            match next {
                Some(next) => toggle = next,
                None => break,
            }
        }
    }

    async fn execute(
        &self,
        key: &CacheKey,
        actor_id: &str,
        previous: &CacheEntry,
    ) -> ToggleResult {
        let adding = !previous.is_member;
        let optimistic_count = self.cache.count(key.kind, &key.target_id);

        match self.write_remote(key, actor_id, adding).await {
            Ok(()) => {
                let count = self.reconciled_count(key, optimistic_count).await;
                let entry = self.cache.settle(key, adding, count);
                Ok(ToggleOutcome {
                    kind: key.kind,
                    target_id: key.target_id.clone(),
                    is_member: entry.is_member,
                    count: entry.count,
                })
            }
            Err(source) => {
                warn!(
                    kind = %key.kind,
                    target_id = %key.target_id,
                    error = %source,
                    "toggle failed, rolling back"
                );
                self.cache.rollback(key, previous);
                Err(CoreError::ToggleFailed {
                    kind: key.kind,
                    target_id: key.target_id.clone(),
                    source,
                })
            }
        }
    }

    async fn write_remote(
        &self,
        key: &CacheKey,
        actor_id: &str,
        adding: bool,
    ) -> Result<(), RemoteError> {
        let mut attempt = 0;
        loop {
            let result = if adding {
                self.add_edge(key, actor_id).await
            } else {
                self.remove_edge(key, actor_id).await
            };

            match result {
                Err(error) if error.is_transient() && attempt < self.network_retries => {
                    attempt += 1;
                    debug!(kind = %key.kind, target_id = %key.target_id, attempt, %error, "retrying toggle write");
                }
                other => return other,
            }
        }
    }

    /// Insert the edge unless it already exists. A uniqueness violation means
    /// another client won the race and counts as success.
    async fn add_edge(&self, key: &CacheKey, actor_id: &str) -> Result<(), RemoteError> {
        let collection = key.kind.collection();
        let existing = self
            .remote
            .query(collection, &edge_filter(key, actor_id), Some(1), None)
            .await?;
        if !existing.is_empty() {
            debug!(kind = %key.kind, target_id = %key.target_id, "edge already present, add confirmed");
            return Ok(());
        }

        let payload = RelationshipRecord::insert_payload(key.kind, actor_id, &key.target_id);
        match self.remote.insert(collection, payload).await {
            Ok(_) => Ok(()),
            Err(error) if error.is_unique_violation() => {
                debug!(kind = %key.kind, target_id = %key.target_id, "concurrent insert won, add confirmed");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn remove_edge(&self, key: &CacheKey, actor_id: &str) -> Result<(), RemoteError> {
        self.remote
            .delete(key.kind.collection(), &edge_filter(key, actor_id))
            .await
    }

    async fn reconciled_count(&self, key: &CacheKey, fallback: u64) -> u64 {
        if self.reconcile == ReconcilePolicy::Never {
            return fallback;
        }

        let filter = Filter::all().eq(key.kind.target_field(), key.target_id.as_str());
        match self.remote.count(key.kind.collection(), &filter).await {
            Ok(count) => count,
            Err(error) => {
                warn!(kind = %key.kind, target_id = %key.target_id, %error, "count reconcile failed, keeping local count");
                fallback
            }
        }
    }
}

fn edge_filter(key: &CacheKey, actor_id: &str) -> Filter {
    Filter::all()
        .eq(key.kind.actor_field(), actor_id)
        .eq(key.kind.target_field(), key.target_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::remote::{MemoryStore, Order, RemoteOp};
    use crate::store::PendingOp;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    const ME: &str = "me";

    fn engine_with(store: Arc<MemoryStore>, config: CoreConfig) -> MutationEngine {
        let cache = Arc::new(RelationshipCache::new(store.clone(), ME, EventBus::new()));
        MutationEngine::new(cache, store, &config)
    }

    fn engine(store: Arc<MemoryStore>) -> MutationEngine {
        engine_with(store, CoreConfig::default())
    }

    fn bookmark(user: &str, post: &str) -> Value {
        json!({"id": format!("b-{}-{}", user, post), "user_id": user, "post_id": post, "created_at": 0})
    }

    fn edges(store: &MemoryStore, kind: RelationshipKind, actor: &str, target: &str) -> usize {
        store
            .rows(kind.collection())
            .iter()
            .filter(|r| r[kind.actor_field()] == actor && r[kind.target_field()] == target)
            .count()
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_exactly() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(RemoteOp::Insert, "bookmarks", RemoteError::network("connection reset"));
        let engine = engine(store.clone());
        engine
            .cache()
            .set_membership(RelationshipKind::Bookmark, "T", false, 3);

        let pending = engine.request_toggle(RelationshipKind::Bookmark, ME, "T");
        let optimistic = engine.cache().get(RelationshipKind::Bookmark, "T");
        assert!(optimistic.is_member);
        assert_eq!(optimistic.count, 4);
        assert_eq!(optimistic.pending_op, Some(PendingOp::Adding));

        let err = pending.await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::ToggleFailed { source: RemoteError::Network { .. }, .. }
        ));
        assert!(err.remote_error().is_some_and(RemoteError::is_transient));
        assert_eq!(
            engine.cache().get(RelationshipKind::Bookmark, "T"),
            CacheEntry {
                is_member: false,
                count: 3,
                pending_op: None
            }
        );
        assert_eq!(edges(&store, RelationshipKind::Bookmark, ME, "T"), 0);
    }

    #[tokio::test]
    async fn test_add_on_existing_edge_skips_insert() {
        let store = MemoryStore::new();
        store.seed("bookmarks", [bookmark(ME, "p1")]);
        let store = Arc::new(store);
        let engine = engine(store.clone());

        let outcome = engine
            .request_toggle(RelationshipKind::Bookmark, ME, "p1")
            .await
            .unwrap();

        assert!(outcome.is_member);
        assert_eq!(outcome.count, 1);
        assert!(store.calls_of(RemoteOp::Insert).is_empty());
        assert_eq!(edges(&store, RelationshipKind::Bookmark, ME, "p1"), 1);
    }

    /// Existence check misses the row another client is inserting concurrently.
    struct RacingStore;

    #[async_trait]
    impl RemoteDataService for RacingStore {
        async fn query(
            &self,
            _collection: &str,
            _filter: &Filter,
            _limit: Option<usize>,
            _order: Option<&Order>,
        ) -> Result<Vec<Value>, RemoteError> {
            Ok(Vec::new())
        }

        async fn insert(&self, collection: &str, _record: Value) -> Result<Value, RemoteError> {
            Err(RemoteError::UniqueViolation {
                collection: collection.to_string(),
            })
        }

        async fn delete(&self, _collection: &str, _filter: &Filter) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn update(
            &self,
            _collection: &str,
            _filter: &Filter,
            _patch: Value,
        ) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn count(&self, _collection: &str, _filter: &Filter) -> Result<u64, RemoteError> {
            Ok(7)
        }
    }

    #[tokio::test]
    async fn test_unique_violation_counts_as_success() {
        let remote: Arc<dyn RemoteDataService> = Arc::new(RacingStore);
        let cache = Arc::new(RelationshipCache::new(remote.clone(), ME, EventBus::new()));
        let engine = MutationEngine::new(cache, remote, &CoreConfig::default());

        let outcome = engine
            .request_toggle(RelationshipKind::Like, ME, "p1")
            .await
            .unwrap();

        assert!(outcome.is_member);
        assert_eq!(outcome.count, 7, "count reconciled from the remote");
    }

    #[tokio::test]
    async fn test_failed_delete_rolls_back() {
        let store = MemoryStore::new();
        store.seed("likes", [json!({"id": "l1", "user_id": ME, "post_id": "p1", "created_at": 0})]);
        store.fail_next(RemoteOp::Delete, "likes", RemoteError::remote("permission denied"));
        let store = Arc::new(store);
        let engine = engine(store.clone());
        engine.cache().set_membership(RelationshipKind::Like, "p1", true, 1);

        let pending = engine.request_toggle(RelationshipKind::Like, ME, "p1");
        assert!(!engine.is_member(RelationshipKind::Like, "p1"));
        assert_eq!(engine.count(RelationshipKind::Like, "p1"), 0);

        assert!(pending.await.is_err());
        assert!(engine.is_member(RelationshipKind::Like, "p1"));
        assert_eq!(engine.count(RelationshipKind::Like, "p1"), 1);
        assert_eq!(edges(&store, RelationshipKind::Like, ME, "p1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_toggles_are_serialized() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_millis(50));
        let engine = engine(store.clone());

        let first = engine.request_toggle(RelationshipKind::Follow, ME, "u2");
        let second = engine.request_toggle(RelationshipKind::Follow, ME, "u2");
        let third = engine.request_toggle(RelationshipKind::Follow, ME, "u2");
        assert!(!first.was_queued());
        assert!(second.was_queued());
        assert!(third.was_queued());
        assert_eq!(engine.outstanding(RelationshipKind::Follow, "u2"), 3);

        // Only the first toggle has been applied so far.
        assert!(engine.is_member(RelationshipKind::Follow, "u2"));

        assert!(first.await.unwrap().is_member);
        assert!(!second.await.unwrap().is_member);
        let last = third.await.unwrap();
        assert!(last.is_member);
        assert_eq!(last.count, 1);

        let writes: Vec<_> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c.op, RemoteOp::Insert | RemoteOp::Delete))
            .map(|c| c.op)
            .collect();
        assert_eq!(writes, vec![RemoteOp::Insert, RemoteOp::Delete, RemoteOp::Insert]);

        assert_eq!(edges(&store, RelationshipKind::Follow, ME, "u2"), 1);
        assert_eq!(engine.outstanding(RelationshipKind::Follow, "u2"), 0);
        assert!(!engine.cache().get(RelationshipKind::Follow, "u2").is_pending());
    }

    #[tokio::test]
    async fn test_queued_toggle_applies_after_rollback() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(RemoteOp::Insert, "comment_likes", RemoteError::network("offline"));
        let engine = engine(store.clone());

        let first = engine.request_toggle(RelationshipKind::CommentLike, ME, "c1");
        let second = engine.request_toggle(RelationshipKind::CommentLike, ME, "c1");

        assert!(first.await.is_err());
        let outcome = second.await.unwrap();
        assert!(outcome.is_member, "second toggle flips the rolled-back state");
        assert_eq!(edges(&store, RelationshipKind::CommentLike, ME, "c1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_run_concurrently() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_millis(100));
        let engine = engine(store.clone());

        let a = engine.request_toggle(RelationshipKind::Bookmark, ME, "p1");
        let b = engine.request_toggle(RelationshipKind::Bookmark, ME, "p2");
        assert!(!a.was_queued());
        assert!(!b.was_queued());
        assert!(engine.is_member(RelationshipKind::Bookmark, "p1"));
        assert!(engine.is_member(RelationshipKind::Bookmark, "p2"));

        let start = tokio::time::Instant::now();
        let (a, b) = tokio::join!(a, b);
        assert!(a.is_ok() && b.is_ok());
        // query + insert + count per key, overlapped across keys
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_reconcile_never_keeps_optimistic_count() {
        let store = MemoryStore::new();
        store.seed("likes", [json!({"id": "l1", "user_id": "u9", "post_id": "p1", "created_at": 0})]);
        let store = Arc::new(store);
        let config = CoreConfig {
            count_reconcile: ReconcilePolicy::Never,
            ..CoreConfig::default()
        };
        let engine = engine_with(store.clone(), config);

        let outcome = engine
            .request_toggle(RelationshipKind::Like, ME, "p1")
            .await
            .unwrap();
        assert_eq!(outcome.count, 1, "local delta only; remote has 2");
        assert!(store.calls_of(RemoteOp::Count).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_corrects_drift() {
        let store = MemoryStore::new();
        store.seed("likes", [json!({"id": "l1", "user_id": "u9", "post_id": "p1", "created_at": 0})]);
        let store = Arc::new(store);
        let engine = engine(store.clone());

        let outcome = engine
            .request_toggle(RelationshipKind::Like, ME, "p1")
            .await
            .unwrap();
        assert_eq!(outcome.count, 2);
    }

    #[tokio::test]
    async fn test_transient_error_retried_when_configured() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(RemoteOp::Insert, "bookmarks", RemoteError::network("blip"));
        let config = CoreConfig {
            network_retries: 1,
            ..CoreConfig::default()
        };
        let engine = engine_with(store.clone(), config);

        let outcome = engine
            .request_toggle(RelationshipKind::Bookmark, ME, "p1")
            .await
            .unwrap();
        assert!(outcome.is_member);
        assert_eq!(store.calls_of(RemoteOp::Insert).len(), 2);
    }

    #[tokio::test]
    async fn test_remote_errors_are_not_retried() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(RemoteOp::Insert, "bookmarks", RemoteError::remote("row level security"));
        let config = CoreConfig {
            network_retries: 3,
            ..CoreConfig::default()
        };
        let engine = engine_with(store.clone(), config);

        assert!(engine
            .request_toggle(RelationshipKind::Bookmark, ME, "p1")
            .await
            .is_err());
        assert_eq!(store.calls_of(RemoteOp::Insert).len(), 1);
    }

    #[tokio::test]
    async fn test_set_relationship_skips_when_already_there() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        assert!(engine
            .set_relationship(RelationshipKind::Follow, ME, "u2", false)
            .is_none());

        let pending = engine
            .set_relationship(RelationshipKind::Follow, ME, "u2", true)
            .unwrap();
        // Already heading to `true`; asking again is a no-op.
        assert!(engine
            .set_relationship(RelationshipKind::Follow, ME, "u2", true)
            .is_none());
        assert!(pending.await.unwrap().is_member);
    }
}
