//! Rendered fetcher: drives a browser session for client-hydrated pages.
//!
//! The browser itself is an external collaborator reached through
//! [`BrowserDriver`]. This module owns the policy: bounded session pool,
//! navigation timeout, consent dismissal and the incremental scroll loop
//! that triggers lazy-loaded content.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchStrategy, FetchedPage, PageFetcher};
use crate::types::config::FetchConfig;

/// Fraction of the document height that counts as "at the bottom".
const BOTTOM_THRESHOLD: f64 = 0.95;

/// Scroll position snapshot of the current document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// `scrollY + innerHeight`
    pub position: f64,
    /// `document.body.scrollHeight`
    pub height: f64,
}

impl ScrollMetrics {
    pub fn near_bottom(&self) -> bool {
        self.height <= 0.0 || self.position >= self.height * BOTTOM_THRESHOLD
    }
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a fresh session.
    ///
    /// Must fail with `FetchError::RendererUnavailable` when the browser
    /// cannot be started at all.
    async fn open_session(&self) -> FetchResult<Box<dyn BrowserSession>>;

    fn name(&self) -> &str {
        "browser"
    }
}

/// One scriptable browsing session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and return the main document's HTTP status.
    async fn navigate(&mut self, url: &str) -> FetchResult<u16>;

    /// Click the first element matching `selector`; `false` when absent.
    async fn click_if_present(&mut self, selector: &str) -> FetchResult<bool>;

    async fn scroll_metrics(&mut self) -> FetchResult<ScrollMetrics>;

    async fn scroll_by(&mut self, pixels: u32) -> FetchResult<()>;

    /// Serialized DOM of the current document.
    async fn content(&mut self) -> FetchResult<String>;

    async fn close(self: Box<Self>);
}

/// Fetcher that renders pages through a [`BrowserDriver`].
pub struct RenderedFetcher<D: BrowserDriver> {
    driver: D,
    permits: Arc<Semaphore>,
    config: FetchConfig,
}

impl<D: BrowserDriver> RenderedFetcher<D> {
    /// Create a fetcher; at most `config.render_concurrency` sessions are
    /// open at once.
    pub fn new(driver: D, config: FetchConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.render_concurrency.max(1)));
        Self {
            driver,
            permits,
            config,
        }
    }

    async fn render(&self, session: &mut dyn BrowserSession, url: &str) -> FetchResult<FetchedPage> {
        let status = tokio::time::timeout(self.config.navigation_timeout, session.navigate(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })??;

        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        tokio::time::sleep(self.config.settle_delay).await;
        self.dismiss_consent(session).await;

        let steps = self.scroll_until_settled(session).await?;
        debug!(url = %url, steps = steps, "Scroll loop finished");

        tokio::time::sleep(self.config.settle_delay).await;
        let html = session.content().await?;

        Ok(FetchedPage::new(url, html, FetchStrategy::Rendered).with_status(status))
    }

    async fn dismiss_consent(&self, session: &mut dyn BrowserSession) {
        for selector in &self.config.consent_selectors {
            match session.click_if_present(selector).await {
                Ok(true) => {
                    debug!(selector = %selector, "Dismissed consent dialog");
                    tokio::time::sleep(self.config.settle_delay).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(selector = %selector, error = %e, "Consent click failed");
                }
            }
        }
    }

    /// Scroll in fixed steps until within 5% of the bottom or the scroll
    /// timeout passes. Returns the number of steps taken.
    async fn scroll_until_settled(&self, session: &mut dyn BrowserSession) -> FetchResult<usize> {
        let deadline = Instant::now() + self.config.scroll_timeout;
        let mut steps = 0;

        loop {
            let metrics = session.scroll_metrics().await?;
            if metrics.near_bottom() {
                break;
            }
            if Instant::now() >= deadline {
                debug!(
                    position = metrics.position,
                    height = metrics.height,
                    "Scroll timeout reached"
                );
                break;
            }
            session.scroll_by(self.config.scroll_step).await?;
            steps += 1;
            tokio::time::sleep(self.config.scroll_poll_interval).await;
        }

        Ok(steps)
    }
}

#[async_trait]
impl<D: BrowserDriver> PageFetcher for RenderedFetcher<D> {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::RendererUnavailable("render pool closed".to_string()))?;

        let mut session = self.driver.open_session().await?;
        let result = self.render(session.as_mut(), url).await;
        session.close().await;

        if let Err(e) = &result {
            warn!(url = %url, driver = self.driver.name(), error = %e, "Rendered fetch failed");
        }
        result
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    fn name(&self) -> &str {
        "rendered"
    }
}
