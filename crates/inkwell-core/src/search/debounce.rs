//! Keystroke debouncing with a staleness guard.
//!
//! Each keystroke cancels the pending settle timer. Once input has been quiet
//! for the settle delay the search is dispatched under a fresh sequence
//! number. Dispatched searches are never cancelled; a response is published
//! only if its sequence number is still the latest issued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::dispatcher::SearchDispatcher;
use super::terms::parse_search_terms;
use crate::error::SourceFailure;
use crate::models::SearchHit;

/// Latest published search state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Sequence number of the dispatch that produced these results (0 = none yet)
    pub seq: u64,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub failures: Vec<SourceFailure>,
}

struct DebounceInner {
    dispatcher: Arc<SearchDispatcher>,
    delay: Duration,
    issued: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    results: watch::Sender<SearchResults>,
}

#[derive(Clone)]
pub struct DebouncedSearch {
    inner: Arc<DebounceInner>,
}

impl DebouncedSearch {
    pub fn new(dispatcher: Arc<SearchDispatcher>, delay: Duration) -> Self {
        let (results, _rx) = watch::channel(SearchResults::default());
        Self {
            inner: Arc::new(DebounceInner {
                dispatcher,
                delay,
                issued: AtomicU64::new(0),
                timer: Mutex::new(None),
                results,
            }),
        }
    }

    /// Feed the current input text. Must be called within a tokio runtime.
    ///
    /// Blank input clears the results immediately and invalidates any
    /// search still in flight.
    pub fn input(&self, text: impl Into<String>) {
        let text = text.into();
        let mut timer = self.inner.timer.lock();
        if let Some(pending) = timer.take() {
            pending.abort();
        }

        if parse_search_terms(&text).is_empty() {
            let seq = self.inner.next_seq();
            self.inner.results.send_replace(SearchResults {
                seq,
                query: text,
                ..SearchResults::default()
            });
            return;
        }

        let inner = self.inner.clone();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let seq = inner.next_seq();
            debug!(seq, query = %text, "dispatching search");
            tokio::spawn(DebounceInner::dispatch(inner, seq, text));
        }));
    }

    /// Drop the pending timer, if any, without dispatching
    pub fn cancel(&self) {
        if let Some(pending) = self.inner.timer.lock().take() {
            pending.abort();
        }
    }

    pub fn results(&self) -> SearchResults {
        self.inner.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.inner.results.subscribe()
    }

    /// Highest sequence number issued so far
    pub fn latest_seq(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }
}

impl DebounceInner {
    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn dispatch(inner: Arc<Self>, seq: u64, query: String) {
        let report = inner.dispatcher.search_report(&query).await;

        let published = inner.results.send_if_modified(|current| {
            if inner.issued.load(Ordering::SeqCst) != seq || current.seq >= seq {
                return false;
            }
            *current = SearchResults {
                seq,
                query: query.clone(),
                hits: report.hits.clone(),
                failures: report.failures.clone(),
            };
            true
        });

        if !published {
            debug!(seq, query = %query, "discarding stale search results");
        }
    }
}
