//! Application-wide constants
//!
//! Centralized location for collection names and default tunables
//! that are used across multiple modules.

use std::time::Duration;

/// Default number of records pulled from each feed source per refresh
pub const DEFAULT_FEED_LIMIT_PER_SOURCE: usize = 10;

/// Default feed polling interval
pub const DEFAULT_FEED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-collection row cap for search queries
pub const DEFAULT_SEARCH_ROW_LIMIT: usize = 10;

/// Default quiet period before a search is dispatched
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default excerpt length (in chars) for feed and search normalizers
pub const DEFAULT_EXCERPT_CHARS: usize = 120;

/// Words per minute used for reading-time estimates
pub const READING_WORDS_PER_MINUTE: usize = 200;

/// Capacity of the core event broadcast channel
pub const EVENT_BUS_CAPACITY: usize = 256;

// Remote collections used by the platform
pub mod collections {
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const LIKES: &str = "likes";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const FOLLOWS: &str = "follows";
    pub const COMMENT_LIKES: &str = "comment_likes";
    pub const PROFILES: &str = "profiles";
    pub const NOTICES: &str = "notices";
    pub const TAGS: &str = "tags";
}

// Common record fields
pub mod fields {
    pub const ID: &str = "id";
    pub const CREATED_AT: &str = "created_at";
    pub const READ: &str = "read";
}
