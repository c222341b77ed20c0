//! Session-wide membership and count state per `(kind, target)`.
//!
//! Entries are created lazily, written optimistically by the mutation engine
//! and rehydrated by [`RelationshipCache::bulk_prefetch`]. Nothing here is
//! persisted; a new session starts empty.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;
use crate::events::{CoreEvent, EventBus};
use crate::models::value_utils::id_field;
use crate::models::RelationshipKind;
use crate::remote::{Filter, RemoteDataService};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: RelationshipKind,
    pub target_id: String,
}

impl CacheKey {
    pub fn new(kind: RelationshipKind, target_id: impl Into<String>) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
        }
    }
}

/// Direction of an unconfirmed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PendingOp {
    Adding,
    Removing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub is_member: bool,
    pub count: u64,
    pub pending_op: Option<PendingOp>,
}

impl CacheEntry {
    pub fn is_pending(&self) -> bool {
        self.pending_op.is_some()
    }
}

#[derive(Debug, Default)]
struct Slot {
    entry: CacheEntry,
    /// Bumped on every write; lets a prefetch detect it raced with a toggle
    revision: u64,
}

pub struct RelationshipCache {
    remote: Arc<dyn RemoteDataService>,
    actor_id: String,
    slots: RwLock<HashMap<CacheKey, Slot>>,
    bus: EventBus,
}

impl RelationshipCache {
    pub fn new(remote: Arc<dyn RemoteDataService>, actor_id: impl Into<String>, bus: EventBus) -> Self {
        Self {
            remote,
            actor_id: actor_id.into(),
            slots: RwLock::new(HashMap::new()),
            bus,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    // ===== Getters =====

    /// Last committed-or-optimistic value. Unknown keys read as not-a-member with count 0.
    pub fn get(&self, kind: RelationshipKind, target_id: &str) -> CacheEntry {
        self.slots
            .read()
            .get(&CacheKey::new(kind, target_id))
            .map(|slot| slot.entry.clone())
            .unwrap_or_default()
    }

    pub fn is_member(&self, kind: RelationshipKind, target_id: &str) -> bool {
        self.get(kind, target_id).is_member
    }

    pub fn count(&self, kind: RelationshipKind, target_id: &str) -> u64 {
        self.get(kind, target_id).count
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    // ===== Mutations =====

    /// Write committed state for a key. Refused (returns `false`) while a toggle is pending.
    pub fn set_membership(
        &self,
        kind: RelationshipKind,
        target_id: &str,
        is_member: bool,
        count: u64,
    ) -> bool {
        let key = CacheKey::new(kind, target_id);
        let entry = {
            let mut slots = self.slots.write();
            let slot = slots.entry(key.clone()).or_default();
            if slot.entry.is_pending() {
                return false;
            }
            slot.entry = CacheEntry {
                is_member,
                count,
                pending_op: None,
            };
            slot.revision += 1;
            slot.entry.clone()
        };
        self.notify(key, entry);
        true
    }

    /// Flip membership and adjust the count by one. Returns the pre-flip entry.
    pub(crate) fn begin_toggle(&self, key: &CacheKey) -> CacheEntry {
        let (previous, entry) = {
            let mut slots = self.slots.write();
            let slot = slots.entry(key.clone()).or_default();
            let previous = slot.entry.clone();
            let adding = !previous.is_member;
            slot.entry = CacheEntry {
                is_member: adding,
                count: if adding {
                    previous.count.saturating_add(1)
                } else {
                    previous.count.saturating_sub(1)
                },
                pending_op: Some(if adding {
                    PendingOp::Adding
                } else {
                    PendingOp::Removing
                }),
            };
            slot.revision += 1;
            (previous, slot.entry.clone())
        };
        self.notify(key.clone(), entry);
        previous
    }

    /// Commit a confirmed toggle and clear its pending marker.
    pub(crate) fn settle(&self, key: &CacheKey, is_member: bool, count: u64) -> CacheEntry {
        self.commit(
            key,
            CacheEntry {
                is_member,
                count,
                pending_op: None,
            },
        )
    }

    /// Restore the pre-toggle entry after a failed remote write.
    pub(crate) fn rollback(&self, key: &CacheKey, previous: &CacheEntry) -> CacheEntry {
        self.commit(
            key,
            CacheEntry {
                pending_op: None,
                ..previous.clone()
            },
        )
    }

    fn commit(&self, key: &CacheKey, entry: CacheEntry) -> CacheEntry {
        {
            let mut slots = self.slots.write();
            let slot = slots.entry(key.clone()).or_default();
            slot.entry = entry.clone();
            slot.revision += 1;
        }
        self.notify(key.clone(), entry.clone());
        entry
    }

    /// Drop every entry (session end)
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Rehydrate membership and counts for many targets at once.
    ///
    /// Issues one membership query for the session actor and one query over
    /// the whole target set whose rows are tallied per target. Entries that
    /// are pending, or that were written while the queries were in flight,
    /// are left untouched. Returns the number of entries written.
    pub async fn bulk_prefetch(
        &self,
        kind: RelationshipKind,
        target_ids: &[String],
    ) -> Result<usize, RemoteError> {
        let targets: Vec<String> = {
            let mut seen = HashSet::new();
            target_ids
                .iter()
                .filter(|t| seen.insert(t.as_str()))
                .cloned()
                .collect()
        };
        if targets.is_empty() {
            return Ok(0);
        }

        let revisions: HashMap<String, u64> = {
            let slots = self.slots.read();
            targets
                .iter()
                .map(|t| {
                    let revision = slots
                        .get(&CacheKey::new(kind, t.as_str()))
                        .map_or(0, |slot| slot.revision);
                    (t.clone(), revision)
                })
                .collect()
        };

        let collection = kind.collection();
        let membership_filter = Filter::all()
            .eq(kind.actor_field(), self.actor_id.as_str())
            .is_in(kind.target_field(), targets.iter().map(String::as_str));
        let count_filter = Filter::all().is_in(kind.target_field(), targets.iter().map(String::as_str));

        let (member_rows, count_rows) = futures::try_join!(
            self.remote.query(collection, &membership_filter, None, None),
            self.remote.query(collection, &count_filter, None, None),
        )?;

        let members: HashSet<String> = target_values(&member_rows, kind.target_field()).collect();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for target in target_values(&count_rows, kind.target_field()) {
            *counts.entry(target).or_insert(0) += 1;
        }

        let mut written = Vec::new();
        {
            let mut slots = self.slots.write();
            for target in &targets {
                let key = CacheKey::new(kind, target.as_str());
                let slot = slots.entry(key.clone()).or_default();
                if slot.entry.is_pending() || slot.revision != revisions[target] {
                    debug!(%kind, target_id = %target, "prefetch skipped entry written meanwhile");
                    continue;
                }
                let is_member = members.contains(target);
                let count = counts.get(target).copied().unwrap_or(0);
                slot.entry = CacheEntry {
                    is_member,
                    count: count.max(u64::from(is_member)),
                    pending_op: None,
                };
                slot.revision += 1;
                written.push((key, slot.entry.clone()));
            }
        }

        let total = written.len();
        for (key, entry) in written {
            self.notify(key, entry);
        }
        Ok(total)
    }

    fn notify(&self, key: CacheKey, entry: CacheEntry) {
        self.bus.emit(CoreEvent::RelationshipChanged {
            kind: key.kind,
            target_id: key.target_id,
            entry,
        });
    }
}

fn target_values<'a>(rows: &'a [Value], field: &'a str) -> impl Iterator<Item = String> + 'a {
    rows.iter().filter_map(move |row| id_field(row, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteOp};
    use serde_json::json;

    fn cache_with(store: Arc<MemoryStore>) -> RelationshipCache {
        RelationshipCache::new(store, "me", EventBus::new())
    }

    fn like(user: &str, post: &str) -> Value {
        json!({"id": format!("{}-{}", user, post), "user_id": user, "post_id": post, "created_at": 0})
    }

    #[test]
    fn test_unknown_key_reads_default() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        assert_eq!(cache.get(RelationshipKind::Like, "p1"), CacheEntry::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_begin_toggle_and_rollback_are_exact() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        cache.set_membership(RelationshipKind::Bookmark, "p1", false, 3);
        let key = CacheKey::new(RelationshipKind::Bookmark, "p1");

        let previous = cache.begin_toggle(&key);
        let optimistic = cache.get(RelationshipKind::Bookmark, "p1");
        assert!(optimistic.is_member);
        assert_eq!(optimistic.count, 4);
        assert_eq!(optimistic.pending_op, Some(PendingOp::Adding));

        cache.rollback(&key, &previous);
        assert_eq!(
            cache.get(RelationshipKind::Bookmark, "p1"),
            CacheEntry {
                is_member: false,
                count: 3,
                pending_op: None
            }
        );
    }

    #[test]
    fn test_removal_never_goes_below_zero() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        cache.set_membership(RelationshipKind::Like, "p1", true, 0);
        cache.begin_toggle(&CacheKey::new(RelationshipKind::Like, "p1"));
        assert_eq!(cache.count(RelationshipKind::Like, "p1"), 0);
    }

    #[test]
    fn test_set_membership_refused_while_pending() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        cache.begin_toggle(&CacheKey::new(RelationshipKind::Follow, "u2"));
        assert!(!cache.set_membership(RelationshipKind::Follow, "u2", false, 0));
        assert!(cache.is_member(RelationshipKind::Follow, "u2"));
    }

    #[tokio::test]
    async fn test_bulk_prefetch_uses_two_queries() {
        let store = MemoryStore::new();
        store.seed(
            "likes",
            [like("me", "p1"), like("u2", "p1"), like("u3", "p2"), like("me", "p9")],
        );
        let store = Arc::new(store);
        let cache = cache_with(store.clone());

        let targets = vec!["p1".to_string(), "p2".to_string(), "p3".to_string(), "p1".to_string()];
        let written = cache.bulk_prefetch(RelationshipKind::Like, &targets).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(store.calls_of(RemoteOp::Query).len(), 2);
        assert_eq!(
            cache.get(RelationshipKind::Like, "p1"),
            CacheEntry {
                is_member: true,
                count: 2,
                pending_op: None
            }
        );
        assert!(!cache.is_member(RelationshipKind::Like, "p2"));
        assert_eq!(cache.count(RelationshipKind::Like, "p2"), 1);
        assert_eq!(cache.count(RelationshipKind::Like, "p3"), 0);
        assert!(!cache.is_member(RelationshipKind::Like, "p9"));
    }

    #[tokio::test]
    async fn test_bulk_prefetch_does_not_overwrite_pending() {
        let store = MemoryStore::new();
        store.seed("bookmarks", [json!({"id": "b1", "user_id": "u2", "post_id": "p1", "created_at": 0})]);
        let store = Arc::new(store);
        let cache = cache_with(store.clone());

        cache.begin_toggle(&CacheKey::new(RelationshipKind::Bookmark, "p1"));
        let written = cache
            .bulk_prefetch(RelationshipKind::Bookmark, &["p1".to_string()])
            .await
            .unwrap();

        assert_eq!(written, 0);
        let entry = cache.get(RelationshipKind::Bookmark, "p1");
        assert!(entry.is_member);
        assert_eq!(entry.pending_op, Some(PendingOp::Adding));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_prefetch_started_before_toggle_keeps_settled_entry() {
        use crate::config::CoreConfig;
        use crate::mutation::MutationEngine;
        use std::time::Duration;

        let store = MemoryStore::new();
        store.seed("bookmarks", [json!({"id": "b1", "user_id": "u2", "post_id": "p1", "created_at": 0})]);
        let store = Arc::new(store);
        let cache = Arc::new(cache_with(store.clone()));

        store.set_latency(Duration::from_secs(1));
        let prefetch = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .bulk_prefetch(RelationshipKind::Bookmark, &["p1".to_string()])
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.set_latency(Duration::ZERO);
        let engine = MutationEngine::new(cache.clone(), store.clone(), &CoreConfig::default());
        let outcome = engine
            .request_toggle(RelationshipKind::Bookmark, "me", "p1")
            .await
            .unwrap();
        assert!(outcome.is_member);
        assert_eq!(outcome.count, 2);

        // The prefetch reads after this lands, so it would see a count of 1
        store
            .delete("bookmarks", &Filter::all().eq("user_id", "u2"))
            .await
            .unwrap();

        let written = prefetch.await.unwrap().unwrap();
        assert_eq!(written, 0);
        assert_eq!(
            cache.get(RelationshipKind::Bookmark, "p1"),
            CacheEntry {
                is_member: true,
                count: 2,
                pending_op: None,
            }
        );
    }

    #[tokio::test]
    async fn test_bulk_prefetch_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(RemoteOp::Query, "follows", RemoteError::network("offline"));
        let cache = cache_with(store);

        let result = cache
            .bulk_prefetch(RelationshipKind::Follow, &["u2".to_string()])
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let cache = RelationshipCache::new(Arc::new(MemoryStore::new()), "me", bus);

        cache.set_membership(RelationshipKind::Like, "p1", true, 5);
        match rx.recv().await.unwrap() {
            CoreEvent::RelationshipChanged { kind, target_id, entry } => {
                assert_eq!(kind, RelationshipKind::Like);
                assert_eq!(target_id, "p1");
                assert_eq!(entry.count, 5);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
