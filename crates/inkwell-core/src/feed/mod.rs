//! Activity feed: per-kind normalizers and the aggregator that merges them.

pub mod aggregator;
pub mod normalize;

pub use aggregator::{ActivityAggregator, ReadReceipt, RefreshReport};
pub use normalize::{default_sources, EventNormalizer, FeedSource};
