use tokio::sync::broadcast;

use crate::constants::EVENT_BUS_CAPACITY;
use crate::models::RelationshipKind;
use crate::store::CacheEntry;

/// Change notifications for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A cache entry was written (optimistic flip, settle, rollback or prefetch)
    RelationshipChanged {
        kind: RelationshipKind,
        target_id: String,
        entry: CacheEntry,
    },
    /// A feed refresh pass was applied
    FeedRefreshed { generation: u64, unread: usize },
    /// Read flags changed locally
    FeedReadChanged { unread: usize },
}

/// Broadcast fan-out for [`CoreEvent`]s. Emitting with no subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
