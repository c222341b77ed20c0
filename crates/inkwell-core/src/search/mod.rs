//! Multi-entity search: term parsing, per-collection sources, the parallel
//! dispatcher and the keystroke debouncer in front of it.

pub mod debounce;
pub mod dispatcher;
pub mod sources;
pub mod terms;

pub use debounce::{DebouncedSearch, SearchResults};
pub use dispatcher::{SearchDispatcher, SearchReport};
pub use sources::{default_sources, HitNormalizer, SearchSource};
pub use terms::{parse_search_terms, text_contains_term};
