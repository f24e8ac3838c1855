//! Tavily web search provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{SearchError, SearchOutcome};
use crate::secrets::ApiKey;
use crate::traits::searcher::{SearchHit, WebSearcher};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'a [String],
}

fn no_domains(domains: &&[String]) -> bool {
    domains.is_empty()
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// Searcher backed by the Tavily API.
pub struct TavilySearcher {
    client: reqwest::Client,
    api_key: ApiKey,
    search_depth: String,
    max_results: usize,
    include_domains: Vec<String>,
}

impl TavilySearcher {
    pub fn new(api_key: ApiKey) -> SearchOutcome<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            api_key,
            search_depth: "basic".to_string(),
            max_results: 5,
            include_domains: Vec::new(),
        })
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Restrict every search to these domains.
    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = domains;
        self
    }

    fn request<'a>(&'a self, query: &'a str, limit: usize) -> TavilyRequest<'a> {
        TavilyRequest {
            query,
            search_depth: &self.search_depth,
            max_results: limit,
            include_domains: &self.include_domains,
        }
    }
}

fn into_hits(response: TavilyResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter_map(|r| {
            let hit = SearchHit::from_url(&r.url)?;
            Some(match r.title {
                Some(title) => hit.with_title(title),
                None => hit,
            })
        })
        .collect()
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str) -> SearchOutcome<Vec<SearchHit>> {
        let limit = self.max_results;
        let response = self
            .client
            .post(TAVILY_API_URL)
            .header("Authorization", self.api_key.bearer())
            .json(&self.request(query, limit))
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            return Err(SearchError::Status {
                status: response.status().as_u16(),
            });
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let mut hits = into_hits(body);
        hits.truncate(limit);
        debug!(query = %query, hits = hits.len(), "Tavily search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
