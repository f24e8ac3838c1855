//! Leaderboard CLI
//!
//! Runs the pipeline for one suburb and prints the JSON payload to stdout.
//! Logs go to stderr.

mod config;

use std::sync::Arc;

use agent_leaderboard::{
    DirectFetcher, InsightsApiClient, NoopSearcher, Pipeline, PipelineConfig, RateLimitedSearcher,
    RunRequest, TavilySearcher, WebSearcher,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "leaderboard", about = "Rank selling agents by sale price over valuation")]
struct Args {
    /// Suburb to rank, e.g. "Ponsonby"
    suburb: String,

    #[arg(long, default_value = "auckland")]
    region: String,

    /// District containing the suburb, used for fallback sources
    #[arg(long)]
    district: Option<String>,

    /// Neighbouring suburbs to widen the search (repeatable)
    #[arg(long = "adjacent")]
    adjacent: Vec<String>,

    #[arg(long, default_value_t = 50)]
    rows_per_page: usize,

    #[arg(long, default_value_t = 2)]
    max_pages: usize,

    #[arg(long, default_value_t = 12)]
    window_months: u32,

    #[arg(long, default_value_t = 30)]
    min_records: usize,

    #[arg(long, default_value_t = 2)]
    min_agents: usize,

    #[arg(long, default_value_t = 6)]
    max_sources: usize,

    /// Rows that need agent data (defaults to --min-records)
    #[arg(long)]
    agent_rows: Option<usize>,

    /// Include source attempts, drop reasons and the attribution log
    #[arg(long)]
    debug: bool,

    /// Pretty-print the JSON payload
    #[arg(long)]
    pretty: bool,
}

impl Args {
    fn request(&self) -> RunRequest {
        let mut request = RunRequest::for_suburb(&self.region, &self.suburb)
            .with_adjacent(self.adjacent.iter().cloned())
            .with_max_pages(self.max_pages)
            .with_min_records(self.min_records)
            .with_min_agents(self.min_agents)
            .with_max_sources(self.max_sources)
            .with_debug(self.debug);
        request.rows_per_page = self.rows_per_page;
        request.window_months = self.window_months;
        request.agent_rows = self.agent_rows;
        if let Some(district) = &self.district {
            request = request.with_district(district);
        }
        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agent_leaderboard=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let args = Args::parse();
    let env = Config::from_env().context("Failed to load configuration")?;

    let mut config = PipelineConfig::default();
    config.site.insights_api_enabled = env.insights_api;
    config.fetch.rendering_enabled = env.render && env.firecrawl_api_key.is_some();

    let direct = Arc::new(DirectFetcher::new(&config.fetch).context("Failed to build HTTP client")?);

    let searcher: Arc<dyn WebSearcher> = match env.tavily_api_key.clone() {
        Some(key) => {
            let tavily = TavilySearcher::new(key).context("Failed to build search client")?;
            Arc::new(RateLimitedSearcher::new(tavily, env.search_rps))
        }
        None => {
            tracing::warn!("TAVILY_API_KEY not set; agent attribution will find nothing");
            Arc::new(NoopSearcher)
        }
    };

    let mut pipeline = Pipeline::new(config.clone(), direct, searcher).context("Invalid pipeline config")?;

    if config.fetch.rendering_enabled {
        pipeline = with_renderer(pipeline, &env, &config)?;
    } else {
        tracing::info!("Rendering disabled; list pages use direct fetches only");
    }

    if config.site.insights_api_enabled {
        let insights =
            InsightsApiClient::new(&config.site, &config.fetch).context("Failed to build insights client")?;
        pipeline = pipeline.with_insights(Arc::new(insights));
    }

    let report = pipeline.run_now(&args.request()).await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    if report.is_aborted() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "firecrawl")]
fn with_renderer(pipeline: Pipeline, env: &Config, config: &PipelineConfig) -> Result<Pipeline> {
    use agent_leaderboard::FirecrawlRenderer;

    let Some(key) = env.firecrawl_api_key.clone() else {
        return Ok(pipeline);
    };
    let renderer =
        FirecrawlRenderer::new(key, config.fetch.clone()).context("Failed to build rendering client")?;
    Ok(pipeline.with_renderer(Arc::new(renderer)))
}

#[cfg(not(feature = "firecrawl"))]
fn with_renderer(pipeline: Pipeline, _env: &Config, _config: &PipelineConfig) -> Result<Pipeline> {
    tracing::warn!("FIRECRAWL_API_KEY set but built without the firecrawl feature; rendering disabled");
    Ok(pipeline)
}
