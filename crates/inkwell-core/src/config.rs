use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EXCERPT_CHARS, DEFAULT_FEED_LIMIT_PER_SOURCE, DEFAULT_FEED_REFRESH_INTERVAL,
    DEFAULT_SEARCH_DEBOUNCE, DEFAULT_SEARCH_ROW_LIMIT,
};

/// When the mutation engine re-fetches the authoritative count after a confirmed toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcilePolicy {
    /// Keep the optimistic +/-1 as the settled count.
    Never,
    /// Query the remote count for the target once the write is confirmed.
    OnSettle,
}

/// Session tunables. Every field has a default, so a partial JSON file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Records pulled from each feed source per refresh
    pub feed_limit_per_source: usize,
    /// Feed polling interval in milliseconds
    pub feed_refresh_interval_ms: u64,
    /// Per-collection row cap for search queries
    pub search_row_limit: usize,
    /// Quiet period before a search is dispatched, in milliseconds
    pub search_debounce_ms: u64,
    pub count_reconcile: ReconcilePolicy,
    /// Extra attempts the mutation engine makes on transient network errors
    pub network_retries: u32,
    pub excerpt_chars: usize,
}

impl CoreConfig {
    /// Load config from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.feed_refresh_interval_ms == 0 {
            bail!("feedRefreshIntervalMs must be greater than zero");
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    pub fn feed_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.feed_refresh_interval_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            feed_limit_per_source: DEFAULT_FEED_LIMIT_PER_SOURCE,
            feed_refresh_interval_ms: DEFAULT_FEED_REFRESH_INTERVAL.as_millis() as u64,
            search_row_limit: DEFAULT_SEARCH_ROW_LIMIT,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64,
            count_reconcile: ReconcilePolicy::OnSettle,
            network_retries: 0,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}
