pub mod filter;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;

pub use filter::{Clause, Filter, Order};
pub use memory::{MemoryStore, RemoteCall, RemoteOp};

/// Queryable record store behind the core (a backend-as-a-service client,
/// or [`MemoryStore`] in tests).
///
/// Every call is latency-bound and may fail with [`RemoteError::Network`]
/// (transient) or [`RemoteError::Remote`] (non-retryable). Calls are not
/// cancelable once issued.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Rows of `collection` matching `filter`, sorted by `order` and capped at `limit`.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Insert one row and return it as stored.
    /// Fails with [`RemoteError::UniqueViolation`] when a uniqueness constraint rejects it.
    async fn insert(&self, collection: &str, record: Value) -> Result<Value, RemoteError>;

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), RemoteError>;

    /// Merge the fields of `patch` into every matching row.
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<(), RemoteError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, RemoteError>;
}
