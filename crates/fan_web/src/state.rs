use std::sync::Arc;

use fan_crawler::CrawlManager;

pub struct AppState {
    pub manager: Arc<CrawlManager>,
    /// Start a background crawl for the searched keyword on every search
    pub crawl_on_read: bool,
    /// Bearer token required by the crawl trigger, open when unset
    pub crawl_token: Option<String>,
}

impl AppState {
    pub fn new(manager: Arc<CrawlManager>) -> Self {
        Self {
            manager,
            crawl_on_read: false,
            crawl_token: None,
        }
    }

    pub fn with_crawl_on_read(mut self, enabled: bool) -> Self {
        self.crawl_on_read = enabled;
        self
    }

    pub fn with_crawl_token(mut self, token: Option<String>) -> Self {
        self.crawl_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Checks an `Authorization: Bearer <token>` header value.
    pub fn authorizes(&self, header: Option<&str>) -> bool {
        let Some(expected) = &self.crawl_token else {
            return true;
        };
        header
            .and_then(|h| h.strip_prefix("Bearer "))
            .is_some_and(|given| tokens_match(given.trim(), expected))
    }
}

// Compares every byte so timing does not leak how much of the token matched.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use fan_core::CrawlConfig;
    use fan_crawler::HttpFetcher;
    use fan_storage::{MemoryStorage, Stores};

    fn state() -> AppState {
        let config = CrawlConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let manager =
            CrawlManager::new(Stores::from_backend(MemoryStorage::new()), fetcher, config).unwrap();
        AppState::new(Arc::new(manager))
    }

    #[test]
    fn test_open_without_token() {
        assert!(state().authorizes(None));
        assert!(state().with_crawl_token(Some("  ".to_string())).authorizes(None));
    }

    #[test]
    fn test_token_forms() {
        let state = state().with_crawl_token(Some("secret".to_string()));
        assert!(state.authorizes(Some("Bearer secret")));
        assert!(!state.authorizes(Some("secret")));
        assert!(!state.authorizes(Some("Basic secret")));
        assert!(!state.authorizes(Some("Bearer secreT")));
        assert!(!state.authorizes(Some("Bearer secret2")));
        assert!(!state.authorizes(None));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abd", "abc"));
        assert!(!tokens_match("ab", "abc"));
        assert!(!tokens_match("", "abc"));
    }
}
