pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod feed;
pub mod models;
pub mod mutation;
pub mod remote;
pub mod search;
pub mod session;
pub mod store;
pub mod tracing_setup;

// Re-export the session-facing types at crate root for convenience
pub use config::{CoreConfig, ReconcilePolicy};
pub use error::{CoreError, RemoteError, SourceFailure};
pub use events::{CoreEvent, EventBus};
pub use feed::{ActivityAggregator, ReadReceipt, RefreshReport};
pub use mutation::{MutationEngine, PendingToggle, ToggleOutcome};
pub use remote::{Clause, Filter, MemoryStore, Order, RemoteDataService};
pub use search::{SearchDispatcher, SearchResults};
pub use session::Session;
