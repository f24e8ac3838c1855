//! Rate-limited searcher wrapper.
//!
//! Search providers bill and throttle per request; attribution issues up to
//! six queries per record, so the wrapper spaces them out with `governor`.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::SearchOutcome;
use crate::traits::searcher::{SearchHit, WebSearcher};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A searcher wrapper that enforces a request rate.
pub struct RateLimitedSearcher<S: WebSearcher> {
    inner: S,
    limiter: Arc<DefaultRateLimiter>,
}

impl<S: WebSearcher> RateLimitedSearcher<S> {
    /// Wrap `searcher`, allowing `requests_per_second` (minimum 1).
    pub fn new(searcher: S, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self::with_quota(searcher, quota)
    }

    /// Sustained rate with a burst allowance.
    pub fn with_burst(searcher: S, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        Self::with_quota(searcher, quota)
    }

    pub fn with_quota(searcher: S, quota: Quota) -> Self {
        Self {
            inner: searcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: WebSearcher> WebSearcher for RateLimitedSearcher<S> {
    async fn search(&self, query: &str) -> SearchOutcome<Vec<SearchHit>> {
        self.limiter.until_ready().await;
        self.inner.search(query).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWebSearcher;

    #[tokio::test]
    async fn test_delegates_to_inner() {
        let searcher = RateLimitedSearcher::with_burst(
            MockWebSearcher::new().with_urls("q", &["https://raywhite.co.nz/x"]),
            10,
            5,
        );
        let hits = searcher.search("q").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(searcher.name(), "mock");
        assert_eq!(searcher.inner().calls(), vec!["q".to_string()]);
    }

    #[test]
    fn test_zero_rate_clamps_to_one() {
        let searcher = RateLimitedSearcher::new(MockWebSearcher::new(), 0);
        let hits = tokio_test::block_on(searcher.search("anything")).unwrap();
        assert!(hits.is_empty());
    }
}
