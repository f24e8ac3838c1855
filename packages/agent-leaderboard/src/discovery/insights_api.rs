//! Insights API source.
//!
//! The listing site exposes a GraphQL search over sold-property insights.
//! When enabled it is tried before any list page: one POST returns profile
//! slugs that map straight onto record-page URLs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::types::config::{FetchConfig, SiteConfig};

const INSIGHTS_QUERY: &str = r#"
query PropertyInsightsSearch($filters: PropertyInsightsSearchFilters, $rows: Int, $page: Int) {
  propertyInsightsSearch(filters: $filters, rows: $rows, page: $page) {
    results {
      id
      address
      salePrice
      saleDate
      profileUrl
    }
  }
}
"#;

/// Source of record-page URLs for an area that bypasses list pages.
#[async_trait]
pub trait InsightsSource: Send + Sync {
    /// Record URLs for `suburb` in `region`, at most `rows` of them.
    async fn record_urls(&self, region: &str, suburb: &str, rows: usize) -> FetchResult<Vec<String>>;

    /// Endpoint identity for the source-attempt log.
    fn endpoint(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: &'static str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    property_insights_search: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<InsightResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightResult {
    profile_url: Option<String>,
}

/// GraphQL client for the insights search.
pub struct InsightsApiClient {
    client: reqwest::Client,
    endpoint: String,
    site: SiteConfig,
}

impl InsightsApiClient {
    pub fn new(site: &SiteConfig, fetch: &FetchConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(agent) = fetch.user_agents.first() {
            if let Ok(value) = HeaderValue::from_str(agent) {
                headers.insert(USER_AGENT, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&site.origin) {
            headers.insert(ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("{}/", site.origin)) {
            headers.insert(REFERER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(fetch.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            endpoint: site.insights_api_url.clone(),
            site: site.clone(),
        })
    }
}

fn request_body(region: &str, suburb: &str, rows: usize) -> GraphQlRequest {
    GraphQlRequest {
        query: INSIGHTS_QUERY,
        variables: json!({
            "filters": {
                "offMarket": false,
                "region": region.to_lowercase(),
                "suburb": suburb.to_lowercase(),
            },
            "rows": rows,
            "page": 1,
        }),
    }
}

fn record_urls_from(response: GraphQlResponse, site: &SiteConfig) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let results = response
        .data
        .and_then(|d| d.property_insights_search)
        .map(|s| s.results)
        .unwrap_or_default();

    for slug in results.into_iter().filter_map(|r| r.profile_url) {
        let slug = slug.trim();
        if slug.is_empty() {
            continue;
        }
        let url = site.record_url(slug);
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[async_trait]
impl InsightsSource for InsightsApiClient {
    async fn record_urls(&self, region: &str, suburb: &str, rows: usize) -> FetchResult<Vec<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body(region, suburb, rows))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: self.endpoint.clone(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.endpoint.clone(),
                status: response.status().as_u16(),
            });
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        let urls = record_urls_from(body, &self.site);
        debug!(region = %region, suburb = %suburb, count = urls.len(), "Insights API returned records");
        Ok(urls)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
