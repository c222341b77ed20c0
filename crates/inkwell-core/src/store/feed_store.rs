use crate::models::Event;
use std::collections::HashSet;

/// Sub-store for the merged activity feed.
///
/// Items are replaced wholesale on every applied refresh. Read flags set
/// during the session survive refreshes through `read_ids` for as long as
/// the event stays in the feed.
pub struct FeedStore {
    items: Vec<Event>,
    read_ids: HashSet<String>,
    applied_generation: u64,
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            read_ids: HashSet::new(),
            applied_generation: 0,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.read_ids.clear();
    }

    // ===== Getters =====

    pub fn get_items(&self) -> &[Event] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.items.iter().find(|e| e.id == id)
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.read_ids.contains(id) || self.get(id).map_or(false, |e| e.read)
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|e| !e.read).count()
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied_generation
    }

    // ===== Mutations =====

    /// Replace the feed with the result of refresh pass `generation`.
    ///
    /// Returns `false` (and changes nothing) if a later pass was already applied.
    pub fn replace(&mut self, generation: u64, mut events: Vec<Event>) -> bool {
        if generation <= self.applied_generation {
            return false;
        }

        // Ids that fell out of the window are forgotten
        self.read_ids
            .retain(|id| events.iter().any(|event| &event.id == id));
        for event in &mut events {
            if self.read_ids.contains(&event.id) {
                event.read = true;
            }
        }
        sort_events(&mut events);
        events.dedup_by(|a, b| a.id == b.id);

        self.items = events;
        self.applied_generation = generation;
        true
    }

    /// Mark one event read. Returns the event if its flag changed.
    pub fn mark_read(&mut self, id: &str) -> Option<Event> {
        let event = self.items.iter_mut().find(|e| e.id == id)?;
        self.read_ids.insert(id.to_string());
        if event.read {
            return None;
        }
        event.read = true;
        Some(event.clone())
    }

    /// Mark every unread event read. Returns the events whose flag changed.
    pub fn mark_all_read(&mut self) -> Vec<Event> {
        let mut changed = Vec::new();
        for event in self.items.iter_mut().filter(|e| !e.read) {
            event.read = true;
            self.read_ids.insert(event.id.clone());
            changed.push(event.clone());
        }
        changed
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort newest first, ties broken by ascending id
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(Event::feed_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use chrono::{TimeZone, Utc};

    fn make_event(kind: EventKind, source_id: &str, secs: i64) -> Event {
        Event::new(kind, source_id, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_empty_store() {
        let store = FeedStore::new();
        assert!(store.get_items().is_empty());
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.applied_generation(), 0);
    }

    #[test]
    fn test_replace_sorts_and_breaks_ties_by_id() {
        let mut store = FeedStore::new();
        store.replace(
            1,
            vec![
                make_event(EventKind::NewLike, "b", 5),
                make_event(EventKind::NewComment, "a", 10),
                make_event(EventKind::NewComment, "z", 5),
                make_event(EventKind::NewLike, "a", 5),
            ],
        );

        let ids: Vec<_> = store.get_items().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["new_comment:a", "new_comment:z", "new_like:a", "new_like:b"]
        );
    }

    #[test]
    fn test_older_generation_is_ignored() {
        let mut store = FeedStore::new();
        assert!(store.replace(2, vec![make_event(EventKind::NewPost, "new", 2)]));
        assert!(!store.replace(1, vec![make_event(EventKind::NewPost, "old", 1)]));
        assert_eq!(store.get_items()[0].source_id, "new");
        assert_eq!(store.applied_generation(), 2);
    }

    #[test]
    fn test_read_flag_survives_replace() {
        let mut store = FeedStore::new();
        store.replace(1, vec![make_event(EventKind::NewFollow, "f1", 1)]);
        assert!(store.mark_read("new_follow:f1").is_some());
        assert!(store.mark_read("new_follow:f1").is_none());

        store.replace(
            2,
            vec![
                make_event(EventKind::NewFollow, "f1", 1),
                make_event(EventKind::NewFollow, "f2", 2),
            ],
        );
        assert!(store.is_read("new_follow:f1"));
        assert!(!store.is_read("new_follow:f2"));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_read_ids_pruned_to_current_window() {
        let mut store = FeedStore::new();
        store.replace(
            1,
            vec![
                make_event(EventKind::NewLike, "l1", 1),
                make_event(EventKind::NewLike, "l2", 2),
            ],
        );
        store.mark_all_read();

        store.replace(2, vec![make_event(EventKind::NewLike, "l2", 2)]);
        assert!(store.is_read("new_like:l2"));
        assert!(!store.is_read("new_like:l1"));

        // Back in the window after being pruned: read state is gone
        store.replace(
            3,
            vec![
                make_event(EventKind::NewLike, "l1", 1),
                make_event(EventKind::NewLike, "l2", 2),
            ],
        );
        assert!(!store.is_read("new_like:l1"));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_all_read_returns_changed_only() {
        let mut store = FeedStore::new();
        store.replace(
            1,
            vec![
                make_event(EventKind::NewPost, "p1", 1),
                make_event(EventKind::NewPost, "p2", 2),
            ],
        );
        store.mark_read("new_post:p1");

        let changed = store.mark_all_read();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].source_id, "p2");
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_mark_read_unknown_id() {
        let mut store = FeedStore::new();
        assert!(store.mark_read("missing").is_none());
        assert!(!store.is_read("missing"));
    }
}
