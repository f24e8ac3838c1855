//! Page fetcher implementations.
//!
//! - [`DirectFetcher`] - one GET with browser-like headers
//! - [`RenderedFetcher`] - browser session with consent dismissal and scrolling
//! - [`FirecrawlRenderer`] - hosted rendering (requires `firecrawl` feature)
//! - [`FetchCascade`] - direct first, rendered on miss

pub mod cascade;
pub mod direct;
#[cfg(feature = "firecrawl")]
pub mod firecrawl;
pub mod rendered;

pub use cascade::{AttemptOutcome, CascadeOutcome, FetchCascade, StrategyAttempt};
pub use direct::DirectFetcher;
#[cfg(feature = "firecrawl")]
pub use firecrawl::FirecrawlRenderer;
pub use rendered::{BrowserDriver, BrowserSession, RenderedFetcher, ScrollMetrics};
