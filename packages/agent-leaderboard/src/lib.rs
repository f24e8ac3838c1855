//! Selling-Agent Leaderboard
//!
//! Finds recently sold residential properties for a target area on a
//! listing site, extracts sale price, sale date and capital valuation from
//! each record page, links each sale to the agency and agent who sold it
//! using an external web search, and ranks agents by how far above
//! valuation their sales closed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agent_leaderboard::{DirectFetcher, NoopSearcher, Pipeline, PipelineConfig, RunRequest};
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::default();
//! let direct = Arc::new(DirectFetcher::new(&config.fetch)?);
//! let pipeline = Pipeline::new(config, direct, Arc::new(NoopSearcher))?;
//!
//! let request = RunRequest::for_suburb("auckland", "Ponsonby").with_district("auckland-city");
//! let report = pipeline.run_now(&request).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Fetch and search capabilities
//! - [`fetchers`] - Direct, rendered and cascading page fetchers
//! - [`searchers`] - Web search implementations (Tavily, rate limiting)
//! - [`discovery`] - List sources, record-link extraction, insights API
//! - [`parsers`] - Text, date, currency, address and valuation parsers
//! - [`pipeline`] - Extraction, filtering, attribution, ranking, orchestration
//! - [`types`] - Configuration, records, rankings and run bookkeeping
//! - [`testing`] - Mock fetchers, browser driver and searcher

pub mod discovery;
pub mod error;
pub mod fetchers;
pub mod parsers;
pub mod pipeline;
pub mod searchers;
pub mod secrets;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{FetchError, PipelineError, SearchError};
pub use secrets::ApiKey;
pub use traits::{
    fetcher::{FetchStrategy, FetchedPage, PageFetcher},
    searcher::{MockWebSearcher, NoopSearcher, SearchHit, WebSearcher},
};
pub use types::{
    config::{
        AgencyBrand, AttributionConfig, ExtractConfig, FetchConfig, ParseConfig, PipelineConfig, RunRequest,
        SiteConfig,
    },
    ranking::AgentRanking,
    record::{RecordFacts, SaleRecord, SourceKind},
    run::{DebugInfo, DropReason, LeaderboardReport, PipelineRun, SourceAttempt, SourceRole},
};

pub use discovery::{InsightsApiClient, InsightsSource, RecordLinkExtractor, SourceBudget};
pub use fetchers::{BrowserDriver, BrowserSession, DirectFetcher, FetchCascade, RenderedFetcher};
#[cfg(feature = "firecrawl")]
pub use fetchers::FirecrawlRenderer;
pub use pipeline::Pipeline;
pub use searchers::{RateLimitedSearcher, TavilySearcher};
