//! Test doubles for the external collaborators.
//!
//! - [`MockFetcher`] - canned HTML per URL, any strategy
//! - [`MockBrowserDriver`] - scriptable browser with a simulated scroll height
//! - [`MockWebSearcher`] - canned search hits per query

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult};
use crate::fetchers::rendered::{BrowserDriver, BrowserSession, ScrollMetrics};
use crate::traits::fetcher::{FetchStrategy, FetchedPage, PageFetcher};

pub use crate::traits::searcher::MockWebSearcher;

type ErrorFactory = Arc<dyn Fn() -> FetchError + Send + Sync>;

/// Mock page fetcher.
///
/// Unknown URLs answer with HTTP 404.
pub struct MockFetcher {
    strategy: FetchStrategy,
    pages: Arc<RwLock<HashMap<String, String>>>,
    calls: Arc<RwLock<Vec<String>>>,
    failure: Option<ErrorFactory>,
}

impl MockFetcher {
    pub fn new(strategy: FetchStrategy) -> Self {
        Self {
            strategy,
            pages: Arc::default(),
            calls: Arc::default(),
            failure: None,
        }
    }

    pub fn direct() -> Self {
        Self::new(FetchStrategy::Direct)
    }

    pub fn rendered() -> Self {
        Self::new(FetchStrategy::Rendered)
    }

    /// Add a page (builder pattern).
    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.add_page(url, html);
        self
    }

    pub fn add_page(&self, url: &str, html: impl Into<String>) {
        self.pages
            .write()
            .unwrap()
            .insert(url.to_string(), html.into());
    }

    /// Fail every fetch with the error `make` builds.
    pub fn failing_with(mut self, make: impl Fn() -> FetchError + Send + Sync + 'static) -> Self {
        self.failure = Some(Arc::new(make));
        self
    }

    /// Shared handle to the URLs requested so far.
    pub fn call_log(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

impl Clone for MockFetcher {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy,
            pages: Arc::clone(&self.pages),
            calls: Arc::clone(&self.calls),
            failure: self.failure.clone(),
        }
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(make) = &self.failure {
            return Err(make());
        }

        match self.pages.read().unwrap().get(url) {
            Some(html) => Ok(FetchedPage::new(url, html.clone(), self.strategy)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock browser driver.
///
/// Pages are `viewport` pixels tall on screen and `height` pixels long;
/// an endless page keeps growing ahead of the scroll position.
pub struct MockBrowserDriver {
    pages: HashMap<String, String>,
    viewport: f64,
    height: f64,
    endless: bool,
    consent_selector: Option<String>,
    fail_launch: bool,
    scrolls: Arc<AtomicUsize>,
    clicks: Arc<RwLock<Vec<String>>>,
}

impl Default for MockBrowserDriver {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
            viewport: 1000.0,
            height: 1000.0,
            endless: false,
            consent_selector: None,
            fail_launch: false,
            scrolls: Arc::default(),
            clicks: Arc::default(),
        }
    }
}

impl MockBrowserDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn with_dimensions(mut self, viewport: f64, height: f64) -> Self {
        self.viewport = viewport;
        self.height = height;
        self
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Element matching `selector` exists on every page.
    pub fn with_consent_selector(mut self, selector: &str) -> Self {
        self.consent_selector = Some(selector.to_string());
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn scroll_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.scrolls)
    }

    pub fn click_log(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.clicks)
    }
}

#[async_trait]
impl BrowserDriver for MockBrowserDriver {
    async fn open_session(&self) -> FetchResult<Box<dyn BrowserSession>> {
        if self.fail_launch {
            return Err(FetchError::RendererUnavailable(
                "browser executable not found".to_string(),
            ));
        }
        Ok(Box::new(MockBrowserSession {
            pages: self.pages.clone(),
            viewport: self.viewport,
            height: self.height,
            endless: self.endless,
            consent_selector: self.consent_selector.clone(),
            scrolls: Arc::clone(&self.scrolls),
            clicks: Arc::clone(&self.clicks),
            current: None,
            scroll_y: 0.0,
        }))
    }

    fn name(&self) -> &str {
        "mock-browser"
    }
}

struct MockBrowserSession {
    pages: HashMap<String, String>,
    viewport: f64,
    height: f64,
    endless: bool,
    consent_selector: Option<String>,
    scrolls: Arc<AtomicUsize>,
    clicks: Arc<RwLock<Vec<String>>>,
    current: Option<String>,
    scroll_y: f64,
}

impl MockBrowserSession {
    fn document_height(&self) -> f64 {
        if self.endless {
            self.scroll_y + self.viewport + 5000.0
        } else {
            self.height
        }
    }
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn navigate(&mut self, url: &str) -> FetchResult<u16> {
        self.scroll_y = 0.0;
        match self.pages.get(url) {
            Some(html) => {
                self.current = Some(html.clone());
                Ok(200)
            }
            None => {
                self.current = None;
                Ok(404)
            }
        }
    }

    async fn click_if_present(&mut self, selector: &str) -> FetchResult<bool> {
        if self.consent_selector.as_deref() == Some(selector) {
            self.clicks.write().unwrap().push(selector.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    async fn scroll_metrics(&mut self) -> FetchResult<ScrollMetrics> {
        Ok(ScrollMetrics {
            position: self.scroll_y + self.viewport,
            height: self.document_height(),
        })
    }

    async fn scroll_by(&mut self, pixels: u32) -> FetchResult<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        let max_y = (self.document_height() - self.viewport).max(0.0);
        self.scroll_y = (self.scroll_y + f64::from(pixels)).min(max_y);
        Ok(())
    }

    async fn content(&mut self) -> FetchResult<String> {
        self.current
            .clone()
            .ok_or_else(|| FetchError::Render("no document loaded".to_string()))
    }

    async fn close(self: Box<Self>) {}
}
