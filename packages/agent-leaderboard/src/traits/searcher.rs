//! Web searcher trait for agent attribution.
//!
//! The attributor only needs "given a query string, return ranked candidate
//! URLs". Providers plug in behind [`WebSearcher`]; an unconfigured provider
//! is the [`NoopSearcher`], which returns nothing instead of failing.
//!
//! ```rust,ignore
//! let hits = searcher.search(r#"site:raywhite.co.nz "12 Smith St""#).await?;
//! for hit in hits {
//!     println!("{}", hit.url);
//! }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use url::Url;

use crate::error::SearchOutcome;

/// One ranked result from a search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: Url,

    /// Title of the page (if the provider returns one).
    pub title: Option<String>,
}

impl SearchHit {
    pub fn new(url: Url) -> Self {
        Self { url, title: None }
    }

    /// Create from a URL string.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// External search capability.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Ranked candidate links for `query`.
    async fn search(&self, query: &str) -> SearchOutcome<Vec<SearchHit>>;

    /// Provider name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Searcher used when no provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearcher;

#[async_trait]
impl WebSearcher for NoopSearcher {
    async fn search(&self, query: &str) -> SearchOutcome<Vec<SearchHit>> {
        tracing::debug!(query = %query, "No search provider configured; returning no results");
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Mock web searcher for testing.
#[derive(Default)]
pub struct MockWebSearcher {
    results: RwLock<HashMap<String, Vec<SearchHit>>>,
    calls: RwLock<Vec<String>>,
}

impl MockWebSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add URL strings as results for an exact query.
    pub fn with_urls(self, query: &str, urls: &[&str]) -> Self {
        let hits: Vec<_> = urls.iter().filter_map(|u| SearchHit::from_url(u)).collect();
        self.results
            .write()
            .unwrap()
            .insert(query.to_string(), hits);
        self
    }

    /// Queries received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for MockWebSearcher {
    async fn search(&self, query: &str) -> SearchOutcome<Vec<SearchHit>> {
        self.calls.write().unwrap().push(query.to_string());
        Ok(self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_web_searcher() {
        let searcher = MockWebSearcher::new().with_urls(
            r#"site:raywhite.co.nz "12 Smith St""#,
            &[
                "https://raywhite.co.nz/listing/1",
                "https://raywhite.co.nz/listing/2",
            ],
        );

        let hits = searcher
            .search(r#"site:raywhite.co.nz "12 Smith St""#)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url.as_str(), "https://raywhite.co.nz/listing/1");
        assert!(searcher.search("unknown").await.unwrap().is_empty());
        assert_eq!(searcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_noop_degrades_to_empty() {
        assert!(NoopSearcher.search("anything").await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_url_is_skipped() {
        assert!(SearchHit::from_url("not a url").is_none());
    }
}
