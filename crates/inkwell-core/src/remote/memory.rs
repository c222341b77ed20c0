//! In-process [`RemoteDataService`] backed by JSON rows in memory.
//!
//! Used by tests and the debug binary. Supports per-collection uniqueness
//! constraints, scripted failures, simulated latency and a call log.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{Filter, Order, RemoteDataService};
use crate::constants::fields;
use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Query,
    Insert,
    Delete,
    Update,
    Count,
}

/// One logged call against the store
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub collection: String,
    pub filter: Option<Filter>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Value>>,
    /// collection -> columns that must be unique together
    unique: HashMap<String, Vec<String>>,
    /// Failures consumed one per matching call
    scripted: HashMap<(RemoteOp, String), VecDeque<RemoteError>>,
    /// Collections where every call fails
    broken: HashMap<String, RemoteError>,
    latency: Duration,
    calls: Vec<RemoteCall>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a collection as-is
    pub fn seed(&self, collection: &str, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.state.lock();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Reject inserts that duplicate an existing row on all of `columns`
    pub fn with_unique(self, collection: &str, columns: &[&str]) -> Self {
        self.state.lock().unique.insert(
            collection.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Fail the next `op` on `collection` with `error`. Calls queue up in order.
    pub fn fail_next(&self, op: RemoteOp, collection: &str, error: RemoteError) {
        self.state
            .lock()
            .scripted
            .entry((op, collection.to_string()))
            .or_default()
            .push_back(error);
    }

    /// Fail every call on `collection` until [`heal`](Self::heal) is called
    pub fn break_collection(&self, collection: &str, error: RemoteError) {
        self.state
            .lock()
            .broken
            .insert(collection.to_string(), error);
    }

    pub fn heal(&self, collection: &str) {
        self.state.lock().broken.remove(collection);
    }

    /// Delay applied to every subsequent call before it takes effect
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of(&self, op: RemoteOp) -> Vec<RemoteCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Log the call and return the latency to wait before executing it
    fn begin(&self, op: RemoteOp, collection: &str, filter: Option<&Filter>) -> Duration {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall {
            op,
            collection: collection.to_string(),
            filter: filter.cloned(),
        });
        state.latency
    }

    async fn enter(
        &self,
        op: RemoteOp,
        collection: &str,
        filter: Option<&Filter>,
    ) -> Result<(), RemoteError> {
        let latency = self.begin(op, collection, filter);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        if let Some(error) = state.broken.get(collection) {
            return Err(error.clone());
        }
        if let Some(error) = state
            .scripted
            .get_mut(&(op, collection.to_string()))
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDataService for MemoryStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, RemoteError> {
        self.enter(RemoteOp::Query, collection, Some(filter)).await?;

        let state = self.state.lock();
        let mut rows: Vec<Value> = state
            .collections
            .get(collection)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, RemoteError> {
        self.enter(RemoteOp::Insert, collection, None).await?;

        let Value::Object(mut row) = record else {
            return Err(RemoteError::remote("insert payload must be an object"));
        };

        let mut state = self.state.lock();
        if let Some(columns) = state.unique.get(collection) {
            let duplicate = state.collections.get(collection).map_or(false, |rows| {
                rows.iter()
                    .any(|existing| columns.iter().all(|c| existing.get(c) == row.get(c)))
            });
            if duplicate {
                return Err(RemoteError::UniqueViolation {
                    collection: collection.to_string(),
                });
            }
        }

        state.next_id += 1;
        let next_id = state.next_id;
        row.entry(fields::ID)
            .or_insert_with(|| Value::String(format!("{}-{}", collection, next_id)));
        row.entry(fields::CREATED_AT)
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let row = Value::Object(row);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), RemoteError> {
        self.enter(RemoteOp::Delete, collection, Some(filter)).await?;

        let mut state = self.state.lock();
        if let Some(rows) = state.collections.get_mut(collection) {
            rows.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteOp::Update, collection, Some(filter)).await?;

        let patch: Map<String, Value> = match patch {
            Value::Object(map) => map,
            _ => return Err(RemoteError::remote("update patch must be an object")),
        };

        let mut state = self.state.lock();
        if let Some(rows) = state.collections.get_mut(collection) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, RemoteError> {
        self.enter(RemoteOp::Count, collection, Some(filter)).await?;

        let state = self.state.lock();
        let count = state
            .collections
            .get(collection)
            .map_or(0, |rows| rows.iter().filter(|r| filter.matches(r)).count());
        Ok(count as u64)
    }
}
