use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::sources::{default_sources, SearchSource};
use super::terms::parse_search_terms;
use crate::config::CoreConfig;
use crate::constants::fields;
use crate::error::SourceFailure;
use crate::models::SearchHit;
use crate::remote::{Filter, Order, RemoteDataService};

/// Combined result of one fan-out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReport {
    /// Hits grouped by source order, newest first within each source
    pub hits: Vec<SearchHit>,
    /// Sources whose query failed and were left out of `hits`
    pub failures: Vec<SourceFailure>,
}

/// Fans one free-text query out to every search source in parallel.
pub struct SearchDispatcher {
    remote: Arc<dyn RemoteDataService>,
    sources: Vec<SearchSource>,
    row_limit: usize,
    excerpt_chars: usize,
}

impl SearchDispatcher {
    pub fn new(remote: Arc<dyn RemoteDataService>, config: &CoreConfig) -> Self {
        Self {
            remote,
            sources: default_sources(),
            row_limit: config.search_row_limit,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Replace the source table (order determines result grouping)
    pub fn with_sources(mut self, sources: Vec<SearchSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn sources(&self) -> &[SearchSource] {
        &self.sources
    }

    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        self.search_report(query).await.hits
    }

    /// Like [`search`](Self::search), but also reports which sources failed.
    ///
    /// A blank query (or one made only of `+` separators) returns an empty
    /// report without touching the remote store.
    pub async fn search_report(&self, query: &str) -> SearchReport {
        let terms = parse_search_terms(query);
        if terms.is_empty() {
            return SearchReport::default();
        }

        let order = Order::desc(fields::CREATED_AT);
        let order = &order;
        let row_limit = self.row_limit;

        let queries = self.sources.iter().map(|source| {
            let filter = Filter::all().search(source.fields.iter().cloned(), terms.clone());
            async move {
                let result = self
                    .remote
                    .query(&source.collection, &filter, Some(row_limit), Some(order))
                    .await;
                (source, result)
            }
        });

        let mut report = SearchReport::default();
        for (source, result) in join_all(queries).await {
            match result {
                Ok(rows) => {
                    let before = report.hits.len();
                    report.hits.extend(
                        rows.iter()
                            .filter_map(|row| (source.normalize)(row, self.excerpt_chars)),
                    );
                    debug!(
                        collection = %source.collection,
                        rows = rows.len(),
                        hits = report.hits.len() - before,
                        "search source returned"
                    );
                }
                Err(error) => {
                    warn!(collection = %source.collection, %error, "search source failed");
                    report.failures.push(SourceFailure {
                        collection: source.collection.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}
