//! Merged activity feed over every [`FeedSource`].
//!
//! A refresh pulls the newest rows from each source in parallel, normalizes
//! them and replaces the feed wholesale. Refreshes may overlap; each takes a
//! generation number when it starts and only the latest-started pass that
//! completes is kept.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::normalize::{default_sources, FeedSource};
use crate::config::CoreConfig;
use crate::constants::{fields, DEFAULT_FEED_REFRESH_INTERVAL};
use crate::error::{CoreError, RemoteError, SourceFailure};
use crate::events::{CoreEvent, EventBus};
use crate::models::Event;
use crate::remote::{Filter, Order, RemoteDataService};
use crate::store::FeedStore;

/// Outcome of one refresh pass
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub generation: u64,
    /// `false` if a later pass had already been applied
    pub applied: bool,
    /// Events normalized from all sources in this pass
    pub event_count: usize,
    pub failures: Vec<SourceFailure>,
}

/// Result of `mark_read` / `mark_all_read`.
///
/// The local flags are already flipped when this is returned. `persisted`
/// waits for the remote writes of kinds that have a persisted read column.
#[derive(Debug)]
pub struct ReadReceipt {
    /// Events whose read flag changed
    pub marked: usize,
    writes: Vec<JoinHandle<Result<(), RemoteError>>>,
}

impl ReadReceipt {
    fn empty() -> Self {
        Self {
            marked: 0,
            writes: Vec::new(),
        }
    }

    /// `true` if any remote write was issued
    pub fn has_remote_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Wait for every remote write. The first failure is returned; local
    /// state stays read either way.
    pub async fn persisted(self) -> Result<(), CoreError> {
        let mut outcome = Ok(());
        for write in self.writes {
            let result = match write.await {
                Ok(result) => result.map_err(CoreError::from),
                Err(_) => Err(CoreError::PersistAborted),
            };
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

struct AggregatorInner {
    remote: Arc<dyn RemoteDataService>,
    sources: Vec<FeedSource>,
    limit_per_source: usize,
    excerpt_chars: usize,
    store: RwLock<FeedStore>,
    generation: AtomicU64,
    bus: EventBus,
}

#[derive(Clone)]
pub struct ActivityAggregator {
    inner: Arc<AggregatorInner>,
}

impl ActivityAggregator {
    pub fn new(remote: Arc<dyn RemoteDataService>, config: &CoreConfig, bus: EventBus) -> Self {
        Self::with_sources(remote, config, bus, default_sources())
    }

    pub fn with_sources(
        remote: Arc<dyn RemoteDataService>,
        config: &CoreConfig,
        bus: EventBus,
        sources: Vec<FeedSource>,
    ) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                remote,
                sources,
                limit_per_source: config.feed_limit_per_source,
                excerpt_chars: config.excerpt_chars,
                store: RwLock::new(FeedStore::new()),
                generation: AtomicU64::new(0),
                bus,
            }),
        }
    }

    // ===== Getters =====

    /// Current merged feed, newest first
    pub fn activity_feed(&self) -> Vec<Event> {
        self.inner.store.read().get_items().to_vec()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.store.read().unread_count()
    }

    pub fn is_read(&self, event_id: &str) -> bool {
        self.inner.store.read().is_read(event_id)
    }

    pub fn applied_generation(&self) -> u64 {
        self.inner.store.read().applied_generation()
    }

    // ===== Refresh =====

    /// Pull the newest `feed_limit_per_source` rows from every source and
    /// replace the feed. A failing source is logged and left out.
    pub async fn refresh(&self) -> RefreshReport {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order::desc(fields::CREATED_AT);
        let order = &order;
        let filter = Filter::all();
        let filter = &filter;

        let queries = inner.sources.iter().map(|source| async move {
            let result = inner
                .remote
                .query(
                    &source.collection,
                    filter,
                    Some(inner.limit_per_source),
                    Some(order),
                )
                .await;
            (source, result)
        });

        let mut events = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in join_all(queries).await {
            match result {
                Ok(rows) => events.extend(
                    rows.iter()
                        .filter_map(|row| (source.normalize)(row, inner.excerpt_chars)),
                ),
                Err(error) => {
                    warn!(collection = %source.collection, %error, "feed source failed");
                    failures.push(SourceFailure {
                        collection: source.collection.clone(),
                        error,
                    });
                }
            }
        }

        let event_count = events.len();
        let (applied, unread) = {
            let mut store = inner.store.write();
            let applied = store.replace(generation, events);
            (applied, store.unread_count())
        };

        if applied {
            debug!(generation, event_count, unread, "feed refreshed");
            inner.bus.emit(CoreEvent::FeedRefreshed { generation, unread });
        } else {
            debug!(generation, "discarding superseded feed refresh");
        }

        RefreshReport {
            generation,
            applied,
            event_count,
            failures,
        }
    }

    /// Refresh triggered by the user opening the feed
    pub async fn open(&self) -> RefreshReport {
        debug!("feed opened");
        self.refresh().await
    }

    /// Refresh immediately, then every `interval` until the handle is aborted.
    /// Ticks missed while a refresh is still running are skipped. A zero
    /// interval falls back to the default.
    pub fn spawn_polling(&self, interval: Duration) -> JoinHandle<()> {
        let interval = if interval.is_zero() {
            warn!("zero feed polling interval, using default");
            DEFAULT_FEED_REFRESH_INTERVAL
        } else {
            interval
        };
        let aggregator = self.clone();
        info!(interval_ms = interval.as_millis() as u64, "starting feed polling");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                aggregator.refresh().await;
            }
        })
    }

    // ===== Read state =====

    /// Mark one event read.
    ///
    /// The local flag flips immediately. Only kinds with a persisted read
    /// column (system notices) are written back; for every other kind the
    /// read state lasts for this session only.
    pub fn mark_read(&self, event_id: &str) -> ReadReceipt {
        let (changed, unread) = {
            let mut store = self.inner.store.write();
            let changed = store.mark_read(event_id);
            (changed, store.unread_count())
        };
        let Some(event) = changed else {
            return ReadReceipt::empty();
        };

        self.inner.bus.emit(CoreEvent::FeedReadChanged { unread });
        ReadReceipt {
            marked: 1,
            writes: self.persist_read(std::slice::from_ref(&event)),
        }
    }

    /// Mark every unread event read, with the same persistence rule as
    /// [`mark_read`](Self::mark_read). Persisted kinds get one batched write
    /// per collection.
    pub fn mark_all_read(&self) -> ReadReceipt {
        let changed = self.inner.store.write().mark_all_read();
        if changed.is_empty() {
            return ReadReceipt::empty();
        }

        self.inner.bus.emit(CoreEvent::FeedReadChanged { unread: 0 });
        ReadReceipt {
            marked: changed.len(),
            writes: self.persist_read(&changed),
        }
    }

    fn persist_read(&self, events: &[Event]) -> Vec<JoinHandle<Result<(), RemoteError>>> {
        let mut by_collection: HashMap<&'static str, Vec<String>> = HashMap::new();
        for event in events {
            if let Some(collection) = event.kind.persisted_read_collection() {
                by_collection
                    .entry(collection)
                    .or_default()
                    .push(event.source_id.clone());
            }
        }

        by_collection
            .into_iter()
            .map(|(collection, ids)| {
                let remote = self.inner.remote.clone();
                tokio::spawn(async move {
                    let filter = match ids.as_slice() {
                        [id] => Filter::all().eq(fields::ID, id.as_str()),
                        _ => Filter::all().is_in(fields::ID, ids.iter().map(String::as_str)),
                    };
                    let mut patch = Map::new();
                    patch.insert(fields::READ.to_string(), Value::Bool(true));
                    let result = remote.update(collection, &filter, Value::Object(patch)).await;
                    if let Err(error) = &result {
                        warn!(collection, count = ids.len(), %error, "failed to persist read state");
                    }
                    result
                })
            })
            .collect()
    }

    /// Drop the feed and read flags (session end)
    pub fn clear(&self) {
        self.inner.store.write().clear();
    }
}
