pub mod feed_store;
pub mod relationship_cache;

pub use feed_store::{sort_events, FeedStore};
pub use relationship_cache::{CacheEntry, CacheKey, PendingOp, RelationshipCache};
