//! Crawl tuning knobs shared by the crawler, the web layer and the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How long a completed crawl keeps a source fresh unless overridden.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Elapsed time after which a checkpoint no longer counts as fresh
    pub stale_after: Duration,
    /// Timeout applied to every outbound request
    pub request_timeout: Duration,
    /// Pause between detail-page fetches
    pub detail_delay: Duration,
    /// Upper bound on the discovered page count
    pub max_pages: u32,
    pub user_agent: String,
    /// Body occurrences needed to keep a candidate whose title and summary miss the query
    pub deep_match_min_occurrences: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            request_timeout: Duration::from_secs(10),
            detail_delay: Duration::from_secs(1),
            max_pages: 50,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            deep_match_min_occurrences: 1,
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be positive".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Per-source defaults used when a crawl is triggered without explicit parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub default_query: String,
    /// Substrings that disqualify an item when found in its title or summary
    #[serde(default)]
    pub exclude: Vec<String>,
}
