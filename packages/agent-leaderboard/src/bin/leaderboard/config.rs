use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use agent_leaderboard::ApiKey;

/// Process configuration loaded from environment variables
pub struct Config {
    pub tavily_api_key: Option<ApiKey>,
    pub firecrawl_api_key: Option<ApiKey>,
    pub render: bool,
    pub insights_api: bool,
    pub search_rps: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            tavily_api_key: ApiKey::from_optional(env::var("TAVILY_API_KEY").ok()),
            firecrawl_api_key: ApiKey::from_optional(env::var("FIRECRAWL_API_KEY").ok()),
            render: flag("LEADERBOARD_RENDER", true)?,
            insights_api: flag("LEADERBOARD_INSIGHTS_API", false)?,
            search_rps: env::var("LEADERBOARD_SEARCH_RPS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("LEADERBOARD_SEARCH_RPS must be a valid number")?,
        })
    }
}

fn flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "on" | "true" | "yes" => Ok(true),
            "0" | "off" | "false" | "no" => Ok(false),
            other => anyhow::bail!("{name} must be on or off, got {other:?}"),
        },
    }
}
