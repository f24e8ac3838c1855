//! Fallback cascade over fetch strategies.
//!
//! Tries the cheap direct fetch first and falls back to rendering when the
//! direct result is unusable. "Unusable" is decided by the caller's
//! acceptance check, so a list page with no record links counts as a miss
//! even when the HTTP request succeeded.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::FetchResult;
use crate::traits::fetcher::{FetchStrategy, FetchedPage, PageFetcher};

/// What happened when one strategy was tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    /// Fetched, but the acceptance check said no
    Rejected(String),
    /// The fetch itself failed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: FetchStrategy,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Result of running the cascade for one URL.
#[derive(Debug)]
pub struct CascadeOutcome<T> {
    /// The accepted value and the strategy that produced it
    pub accepted: Option<(T, FetchStrategy)>,
    /// Every strategy tried, in order
    pub attempts: Vec<StrategyAttempt>,
}

impl<T> CascadeOutcome<T> {
    pub fn strategy(&self) -> Option<FetchStrategy> {
        self.accepted.as_ref().map(|(_, s)| *s)
    }

    pub fn strategies_tried(&self) -> Vec<FetchStrategy> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }

    /// Last failure or rejection message, if nothing was accepted.
    pub fn last_error(&self) -> Option<String> {
        if self.accepted.is_some() {
            return None;
        }
        self.attempts.last().and_then(|a| match &a.outcome {
            AttemptOutcome::Accepted => None,
            AttemptOutcome::Rejected(msg) | AttemptOutcome::Failed(msg) => Some(msg.clone()),
        })
    }
}

/// Ordered list of fetchers tried until one result is accepted.
#[derive(Clone)]
pub struct FetchCascade {
    fetchers: Vec<Arc<dyn PageFetcher>>,
}

impl FetchCascade {
    /// Start a cascade with the primary fetcher.
    pub fn new(primary: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetchers: vec![primary],
        }
    }

    /// Append a fallback fetcher.
    pub fn with_fallback(mut self, fallback: Arc<dyn PageFetcher>) -> Self {
        info!(fetcher = fallback.name(), "Fallback fetcher enabled");
        self.fetchers.push(fallback);
        self
    }

    pub fn strategies(&self) -> Vec<FetchStrategy> {
        self.fetchers.iter().map(|f| f.strategy()).collect()
    }

    /// Fetch `url` with each strategy in turn until `accept` returns `Ok`.
    ///
    /// Non-fatal fetch errors move on to the next strategy. A fatal error
    /// (`RendererUnavailable`) is returned immediately.
    pub async fn first_accepted<T, F>(&self, url: &str, accept: F) -> FetchResult<CascadeOutcome<T>>
    where
        F: Fn(&FetchedPage) -> Result<T, String>,
    {
        let mut attempts = Vec::with_capacity(self.fetchers.len());

        for fetcher in &self.fetchers {
            let strategy = fetcher.strategy();
            match fetcher.fetch(url).await {
                Ok(page) => match accept(&page) {
                    Ok(value) => {
                        debug!(url = %url, strategy = ?strategy, "Fetch accepted");
                        attempts.push(StrategyAttempt {
                            strategy,
                            outcome: AttemptOutcome::Accepted,
                        });
                        return Ok(CascadeOutcome {
                            accepted: Some((value, strategy)),
                            attempts,
                        });
                    }
                    Err(reason) => {
                        debug!(url = %url, strategy = ?strategy, reason = %reason, "Fetch rejected");
                        attempts.push(StrategyAttempt {
                            strategy,
                            outcome: AttemptOutcome::Rejected(reason),
                        });
                    }
                },
                Err(e) if e.is_fatal() => {
                    warn!(url = %url, strategy = ?strategy, error = %e, "Fatal fetch error");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = %url, strategy = ?strategy, error = %e, "Fetch failed, trying next strategy");
                    attempts.push(StrategyAttempt {
                        strategy,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        Ok(CascadeOutcome {
            accepted: None,
            attempts,
        })
    }
}
