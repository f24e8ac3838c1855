//! Hosted rendering through the Firecrawl scrape API.
//!
//! Stands in for a local browser when none is installed: Firecrawl runs the
//! page in its own browser, performs the scroll actions we ask for and
//! returns the raw rendered HTML.
//!
//! Requires the `firecrawl` feature to be enabled.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::secrets::ApiKey;
use crate::traits::fetcher::{FetchStrategy, FetchedPage, PageFetcher};
use crate::types::config::FetchConfig;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Number of scroll actions requested per page.
const SCROLL_ACTIONS: usize = 8;

/// Rendered fetcher backed by Firecrawl.
pub struct FirecrawlRenderer {
    client: Client,
    api_key: ApiKey,
    permits: Arc<Semaphore>,
    config: FetchConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
    wait_for: u64,
    timeout: u64,
    actions: Vec<Action>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Action {
    Wait { milliseconds: u64 },
    Scroll { direction: &'static str },
    #[serde(rename = "executeJavascript")]
    ExecuteJavascript { script: String },
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeData {
    raw_html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMetadata {
    status_code: Option<u16>,
}

impl FirecrawlRenderer {
    pub fn new(api_key: ApiKey, config: FetchConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.navigation_timeout + config.scroll_timeout)
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        let permits = Arc::new(Semaphore::new(config.render_concurrency.max(1)));
        Ok(Self {
            client,
            api_key,
            permits,
            config,
        })
    }

    fn actions(&self) -> Vec<Action> {
        let settle = self.config.settle_delay.as_millis() as u64;
        let poll = self.config.scroll_poll_interval.as_millis() as u64;

        let mut actions = vec![Action::Wait { milliseconds: settle }];
        // A click action fails the whole scrape when its selector is missing,
        // so consent is dismissed by a script that tolerates absent banners.
        if let Some(script) = self.consent_script() {
            actions.push(Action::ExecuteJavascript { script });
        }
        for _ in 0..SCROLL_ACTIONS {
            actions.push(Action::Scroll { direction: "down" });
            actions.push(Action::Wait { milliseconds: poll });
        }
        actions.push(Action::Wait { milliseconds: settle });
        actions
    }

    /// Clicks the first consent control present on the page, if any.
    fn consent_script(&self) -> Option<String> {
        if self.config.consent_selectors.is_empty() {
            return None;
        }
        let selectors = serde_json::to_string(&self.config.consent_selectors).ok()?;
        Some(format!(
            "(() => {{ for (const s of {selectors}) {{ const el = document.querySelector(s); \
             if (el) {{ el.click(); return; }} }} }})();"
        ))
    }

    fn request<'a>(&self, url: &'a str) -> ScrapeRequest<'a> {
        ScrapeRequest {
            url,
            formats: vec!["rawHtml"],
            wait_for: self.config.settle_delay.as_millis() as u64,
            timeout: self.config.navigation_timeout.as_millis() as u64,
            actions: self.actions(),
        }
    }
}

#[async_trait]
impl PageFetcher for FirecrawlRenderer {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::RendererUnavailable("render pool closed".to_string()))?;

        debug!(url = %url, "Firecrawl scrape starting");
        let response = self
            .client
            .post(format!("{}/scrape", FIRECRAWL_API_URL))
            .header("Authorization", self.api_key.bearer())
            .json(&self.request(url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::RendererUnavailable(format!(
                "Firecrawl rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, body = %text, "Firecrawl API error");
            return Err(FetchError::Render(format!("Firecrawl API error: {}", status)));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        if !body.success {
            return Err(FetchError::Render(
                body.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        let data = body
            .data
            .ok_or_else(|| FetchError::Render("scrape returned no data".to_string()))?;
        let page_status = data
            .metadata
            .and_then(|m| m.status_code)
            .unwrap_or(200);
        if !(200..300).contains(&page_status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page_status,
            });
        }

        let html = data.raw_html.unwrap_or_default();
        debug!(url = %url, bytes = html.len(), "Firecrawl scrape complete");
        Ok(FetchedPage::new(url, html, FetchStrategy::Rendered).with_status(page_status))
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let renderer =
            FirecrawlRenderer::new(ApiKey::new("fc-test"), FetchConfig::default()).unwrap();
        let json = serde_json::to_value(renderer.request("https://site.nz/list")).unwrap();

        assert_eq!(json["formats"][0], "rawHtml");
        assert_eq!(json["url"], "https://site.nz/list");
        let actions = json["actions"].as_array().unwrap();
        assert_eq!(actions[0]["type"], "wait");
        assert!(actions.iter().any(|a| a["type"] == "scroll"));
        assert_eq!(
            actions.iter().filter(|a| a["type"] == "scroll").count(),
            SCROLL_ACTIONS
        );

        // consent goes through a script, never a click that could fail the scrape
        assert!(!actions.iter().any(|a| a["type"] == "click"));
        let script = actions
            .iter()
            .find(|a| a["type"] == "executeJavascript")
            .and_then(|a| a["script"].as_str())
            .unwrap();
        for selector in &FetchConfig::default().consent_selectors {
            let quoted = serde_json::to_string(selector).unwrap();
            assert!(script.contains(&quoted), "missing {selector} in {script}");
        }
        assert!(script.contains("if (el)"));
    }

    #[test]
    fn test_no_consent_script_without_selectors() {
        let config = FetchConfig {
            consent_selectors: Vec::new(),
            ..FetchConfig::default()
        };
        let renderer = FirecrawlRenderer::new(ApiKey::new("fc-test"), config).unwrap();
        let json = serde_json::to_value(renderer.request("https://site.nz/list")).unwrap();
        let actions = json["actions"].as_array().unwrap();
        assert!(!actions.iter().any(|a| a["type"] == "executeJavascript"));
        assert_eq!(actions[0]["type"], "wait");
    }

    #[test]
    fn test_response_decodes_raw_html() {
        let body: ScrapeResponse = serde_json::from_str(
            r#"{"success":true,"data":{"rawHtml":"<html></html>","metadata":{"statusCode":200}}}"#,
        )
        .unwrap();
        let data = body.data.unwrap();
        assert_eq!(data.raw_html.as_deref(), Some("<html></html>"));
        assert_eq!(data.metadata.unwrap().status_code, Some(200));
    }
}
