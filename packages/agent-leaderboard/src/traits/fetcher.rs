//! Page fetcher trait.
//!
//! "Fetch HTML for a URL" is an external capability. Implementations range
//! from a plain GET ([`DirectFetcher`](crate::fetchers::DirectFetcher)) to a
//! full browser session ([`RenderedFetcher`](crate::fetchers::RenderedFetcher)).
//!
//! ```rust,ignore
//! let page = fetcher.fetch("https://www.trademe.co.nz/a/property/insights/profile/abc").await?;
//! let text = agent_leaderboard::parsers::normalize_text(&page.html);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchResult;

/// How a page was retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// One GET with browser-like headers.
    Direct,
    /// Browser session with scrolling for lazy-loaded content.
    Rendered,
}

/// HTML returned for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Requested URL
    pub url: String,

    /// Raw HTML (rendered DOM for the rendered strategy)
    pub html: String,

    /// HTTP status of the main document
    pub status: u16,

    pub strategy: FetchStrategy,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>, strategy: FetchStrategy) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            status: 200,
            strategy,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Fetch HTML for a URL.
///
/// Implementations must return an error for non-success statuses and
/// timeouts, and `FetchError::RendererUnavailable` only when the
/// underlying rendering collaborator cannot start at all.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Which strategy this fetcher implements.
    fn strategy(&self) -> FetchStrategy;

    /// Fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
