//! Direct HTTP fetcher.
//!
//! One GET per page with a browser-like header set. Cheap, and enough
//! whenever the listing site renders its content server-side.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchStrategy, FetchedPage, PageFetcher};
use crate::types::config::FetchConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (compatible; agent-leaderboard/0.1)";

/// Fetcher that issues a single GET per URL.
///
/// The user agent rotates round-robin through the configured pool. The
/// rotation counter belongs to this instance, not to the process.
pub struct DirectFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
}

impl DirectFetcher {
    /// Create a fetcher from the fetch configuration.
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self::with_client(client, config.user_agents.clone()))
    }

    /// Use a custom HTTP client.
    pub fn with_client(client: reqwest::Client, user_agents: Vec<String>) -> Self {
        Self {
            client,
            user_agents,
            next_agent: AtomicUsize::new(0),
        }
    }

    fn next_user_agent(&self) -> &str {
        if self.user_agents.is_empty() {
            return FALLBACK_USER_AGENT;
        }
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[index]
    }
}

#[async_trait]
impl PageFetcher for DirectFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        debug!(url = %url, "Direct fetch starting");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.next_user_agent())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    warn!(url = %url, error = %e, "HTTP request failed");
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        debug!(url = %url, bytes = html.len(), "Direct fetch complete");
        Ok(FetchedPage::new(url, html, FetchStrategy::Direct).with_status(status.as_u16()))
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Direct
    }

    fn name(&self) -> &str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_rotates() {
        let fetcher = DirectFetcher::with_client(
            reqwest::Client::new(),
            vec!["ua-1".to_string(), "ua-2".to_string()],
        );
        assert_eq!(fetcher.next_user_agent(), "ua-1");
        assert_eq!(fetcher.next_user_agent(), "ua-2");
        assert_eq!(fetcher.next_user_agent(), "ua-1");
    }

    #[test]
    fn test_empty_pool_uses_fallback_agent() {
        let fetcher = DirectFetcher::with_client(reqwest::Client::new(), Vec::new());
        assert_eq!(fetcher.next_user_agent(), FALLBACK_USER_AGENT);
    }

    #[test]
    fn test_builds_from_default_config() {
        let fetcher = DirectFetcher::new(&FetchConfig::default()).unwrap();
        assert_eq!(fetcher.strategy(), FetchStrategy::Direct);
        assert_eq!(fetcher.name(), "direct");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_request() {
        let fetcher = DirectFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
