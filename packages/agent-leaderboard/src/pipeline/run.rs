//! Pipeline orchestration.
//!
//! ```text
//! validate -> [insights api] -> list sources (paged, cascaded fetch)
//!          -> record pages -> screen + dedup -> attribute -> rank
//! ```
//!
//! Each stage absorbs its own failures and counts them against the run.
//! Only a bad request or an unavailable renderer aborts.

use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::discovery::{build_sources, InsightsSource, RecordLinkExtractor, SourceBudget};
use crate::error::{FetchResult, PipelineError, PipelineResult};
use crate::fetchers::{AttemptOutcome, CascadeOutcome, FetchCascade, StrategyAttempt};
use crate::pipeline::attribute::Attributor;
use crate::pipeline::extract::{extract_facts, screen, window_cutoff, Screening};
use crate::pipeline::filter::RecordSet;
use crate::pipeline::rank::rank_agents;
use crate::traits::fetcher::PageFetcher;
use crate::traits::searcher::WebSearcher;
use crate::types::config::{PipelineConfig, RunRequest};
use crate::types::ranking::AgentRanking;
use crate::types::record::{RecordFacts, SaleRecord};
use crate::types::run::{DropReason, LeaderboardReport, PipelineRun, SourceAttempt, SourceRole};

const INSIGHTS_SOURCE_ID: &str = "insights-api";

/// Sold-property discovery, extraction, attribution and ranking for one
/// area per call.
pub struct Pipeline {
    config: PipelineConfig,
    cascade: FetchCascade,
    links: RecordLinkExtractor,
    attributor: Attributor,
    insights: Option<Arc<dyn InsightsSource>>,
}

impl Pipeline {
    /// Pipeline using `direct` for every fetch and `searcher` for agent
    /// attribution.
    pub fn new(
        config: PipelineConfig,
        direct: Arc<dyn PageFetcher>,
        searcher: Arc<dyn WebSearcher>,
    ) -> PipelineResult<Self> {
        let links = RecordLinkExtractor::new(&config.site)?;
        let attributor = Attributor::new(
            searcher,
            direct.clone(),
            &config.attribution,
            &config.parse,
        )?;

        Ok(Self {
            cascade: FetchCascade::new(direct),
            links,
            attributor,
            insights: None,
            config,
        })
    }

    /// Add a rendering fallback for list and record pages. Ignored when
    /// rendering is disabled in the fetch config.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageFetcher>) -> Self {
        if self.config.fetch.rendering_enabled {
            self.cascade = self.cascade.with_fallback(renderer);
        } else {
            debug!(renderer = renderer.name(), "Rendering disabled; renderer not used");
        }
        self
    }

    /// Add the insights API as the first discovery source. Only consulted
    /// when the site config enables it.
    pub fn with_insights(mut self, source: Arc<dyn InsightsSource>) -> Self {
        self.insights = Some(source);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with today's local date as the end of the recency window.
    pub async fn run_now(&self, request: &RunRequest) -> LeaderboardReport {
        self.run(request, Local::now().date_naive()).await
    }

    /// Execute one run. Never fails: an aborted run returns an empty
    /// payload carrying the error.
    pub async fn run(&self, request: &RunRequest, today: NaiveDate) -> LeaderboardReport {
        let request = request.clone().normalized();
        let mut run = PipelineRun::new(request.clone());

        info!(
            run_id = %run.run_id,
            region = %request.region,
            suburb = %request.suburb,
            today = %today,
            strategies = ?self.cascade.strategies(),
            "Leaderboard run starting"
        );

        let outcome = self.execute(&request, today, &mut run).await;
        let debug = request.debug.then(|| run.debug_info());

        match outcome {
            Ok((properties, agent_rankings)) => {
                info!(
                    run_id = %run.run_id,
                    properties = properties.len(),
                    rankings = agent_rankings.len(),
                    sources_tried = run.sources_tried(),
                    "Leaderboard run complete"
                );
                LeaderboardReport {
                    agent_rankings,
                    properties,
                    warning: run.joined_warnings(),
                    error: None,
                    debug,
                }
            }
            Err(e) => {
                error!(run_id = %run.run_id, error = %e, "Leaderboard run aborted");
                LeaderboardReport {
                    warning: run.joined_warnings(),
                    debug,
                    ..LeaderboardReport::aborted(e.to_string())
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        today: NaiveDate,
        run: &mut PipelineRun,
    ) -> PipelineResult<(Vec<SaleRecord>, Vec<AgentRanking>)> {
        validate(request)?;

        let cutoff = window_cutoff(today, request.window_months);
        let budget = SourceBudget::from_request(request);
        let mut records = RecordSet::new();
        let mut visited: HashSet<String> = HashSet::new();

        if self.config.site.insights_api_enabled {
            if let Some(insights) = &self.insights {
                self.collect_from_insights(insights.as_ref(), request, cutoff, &mut records, &mut visited, run)
                    .await?;
            }
        }

        for source in build_sources(&self.config.site, request) {
            if !budget.should_continue(&run.attempts, records.len()) {
                debug!(source = %source.id, accepted = records.len(), "Source budget exhausted");
                break;
            }
            info!(source = %source.id, accepted = records.len(), "Trying list source");

            for (page, url) in &source.pages {
                if budget.target_met(records.len()) {
                    break;
                }

                let outcome = self
                    .cascade
                    .first_accepted(url, |fetched| {
                        let links = self.links.extract(&fetched.html);
                        if links.is_empty() {
                            Err("no record links".to_string())
                        } else {
                            Ok(links)
                        }
                    })
                    .await?;

                let mut attempt = SourceAttempt {
                    source: source.id.clone(),
                    role: source.role.clone(),
                    url: url.clone(),
                    page: *page,
                    strategy: outcome.strategy(),
                    strategies_tried: outcome.attempts.len(),
                    links_found: 0,
                    records_added: 0,
                    error: outcome.last_error(),
                };

                let Some((links, _)) = outcome.accepted else {
                    // an unreachable page skips to the next one; an empty page ends the source
                    if all_failed(&outcome.attempts) {
                        warn!(source = %source.id, url = %url, error = ?attempt.error, "List page fetch failed");
                        run.count_drop(DropReason::ListFetchFailed);
                        run.attempts.push(attempt);
                        continue;
                    }
                    debug!(source = %source.id, url = %url, "List page has no record links");
                    run.attempts.push(attempt);
                    break;
                };

                attempt.links_found = links.len();
                let fresh: Vec<String> = links.into_iter().filter(|l| visited.insert(l.clone())).collect();
                attempt.records_added = self.collect_records(&fresh, cutoff, &mut records, run).await?;
                debug!(
                    source = %source.id,
                    page = *page,
                    links = attempt.links_found,
                    added = attempt.records_added,
                    "List page processed"
                );
                run.attempts.push(attempt);
            }
        }

        let accepted = records.len();
        if accepted == 0 {
            run.warn(format!(
                "No sold properties found for {} after trying {} sources",
                request.suburb,
                run.sources_tried()
            ));
        } else if accepted < request.min_records {
            run.warn(format!(
                "Only {accepted} of {} target properties found after trying {} sources",
                request.min_records,
                run.sources_tried()
            ));
        }

        let mut properties = records.into_records();
        let attributed = self
            .attributor
            .attribute_all(&mut properties, request.agent_rows(), run)
            .await?;
        if attributed == 0 && !properties.is_empty() {
            run.warn("No properties could be attributed to an agent");
        }

        let ranked = rank_agents(&properties, request.min_agents_for_ranking);
        if ranked.relaxed {
            run.warn(format!(
                "No agent had {} or more sales; ranking includes single sales",
                request.min_agents_for_ranking
            ));
        }

        Ok((properties, ranked.rankings))
    }

    async fn collect_from_insights(
        &self,
        source: &dyn InsightsSource,
        request: &RunRequest,
        cutoff: NaiveDate,
        records: &mut RecordSet,
        visited: &mut HashSet<String>,
        run: &mut PipelineRun,
    ) -> PipelineResult<()> {
        let rows = request.rows_per_page * request.max_pages;
        let mut attempt = SourceAttempt {
            source: INSIGHTS_SOURCE_ID.to_string(),
            role: SourceRole::InsightsApi,
            url: source.endpoint().to_string(),
            page: 1,
            strategy: None,
            strategies_tried: 1,
            links_found: 0,
            records_added: 0,
            error: None,
        };

        match source.record_urls(&request.region, &request.suburb, rows).await {
            Ok(urls) => {
                info!(count = urls.len(), "Insights API returned record URLs");
                attempt.links_found = urls.len();
                let fresh: Vec<String> = urls.into_iter().filter(|u| visited.insert(u.clone())).collect();
                attempt.records_added = self.collect_records(&fresh, cutoff, records, run).await?;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Insights API failed; falling back to list pages");
                run.count_drop(DropReason::ListFetchFailed);
                attempt.error = Some(e.to_string());
            }
        }

        run.attempts.push(attempt);
        Ok(())
    }

    /// Fetch and screen record pages, admitting them in `urls` order.
    /// Returns how many records were added.
    async fn collect_records(
        &self,
        urls: &[String],
        cutoff: NaiveDate,
        records: &mut RecordSet,
        run: &mut PipelineRun,
    ) -> PipelineResult<usize> {
        let parse = &self.config.parse;
        let fetched: Vec<FetchResult<CascadeOutcome<RecordFacts>>> = stream::iter(urls.iter().map(|url| {
            self.cascade.first_accepted(url, move |page| {
                let facts = extract_facts(&page.html, parse);
                if facts.sold_price.is_some() || facts.capital_value.is_some() {
                    Ok(facts)
                } else {
                    Err("no sale facts".to_string())
                }
            })
        }))
        .buffered(self.config.extract.concurrency.max(1))
        .collect()
        .await;

        let mut added = 0;
        for (url, outcome) in urls.iter().zip(fetched) {
            let outcome = outcome?;
            let facts = match outcome.accepted {
                Some((facts, _)) => facts,
                None if all_failed(&outcome.attempts) => {
                    debug!(url = %url, error = ?outcome.last_error(), "Record fetch failed");
                    run.count_drop(DropReason::FetchFailed);
                    continue;
                }
                // fetched, but nothing to read: screens as a missing price
                None => RecordFacts::default(),
            };

            match screen(facts, url, cutoff) {
                Screening::Accepted(record) => match records.admit(record) {
                    Ok(()) => added += 1,
                    Err(reason) => run.count_drop(reason),
                },
                Screening::Dropped(reason) => {
                    debug!(url = %url, reason = ?reason, "Record dropped");
                    run.count_drop(reason);
                }
                Screening::Unidentified => debug!(url = %url, "Record has no address; skipped"),
            }
        }

        Ok(added)
    }
}

fn all_failed(attempts: &[StrategyAttempt]) -> bool {
    attempts
        .iter()
        .all(|a| matches!(a.outcome, AttemptOutcome::Failed(_)))
}

fn validate(request: &RunRequest) -> PipelineResult<()> {
    let invalid = |reason: &str| {
        Err(PipelineError::InvalidRequest {
            reason: reason.to_string(),
        })
    };

    if request.suburb.is_empty() {
        return invalid("suburb required");
    }
    if request.rows_per_page == 0 {
        return invalid("rowsPerPage must be at least 1");
    }
    if request.max_pages == 0 {
        return invalid("maxPages must be at least 1");
    }
    if request.max_sources == 0 {
        return invalid("maxSources must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testing::{MockFetcher, MockWebSearcher};

    const LIST: &str = r#"<a href="/a/property/insights/profile/one">1</a>
        <a href="/a/property/insights/profile/two">2</a>"#;

    fn record_page(address: &str, price: &str, date: &str) -> String {
        format!("<h1>{address}</h1><p>Sold on {date} for {price}</p><p>Capital Value $1,000,000</p>")
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.fetch.rendering_enabled = true;
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn list_url(config: &PipelineConfig, area: &str, page: usize) -> String {
        format!(
            "{}{}{area}?rows=50&page={page}",
            config.site.origin, config.site.list_path
        )
    }

    fn profile(config: &PipelineConfig, slug: &str) -> String {
        config.site.record_url(slug)
    }

    #[tokio::test]
    async fn test_blank_suburb_aborts() {
        let pipeline = Pipeline::new(
            config(),
            Arc::new(MockFetcher::direct()),
            Arc::new(MockWebSearcher::new()),
        )
        .unwrap();

        let report = pipeline.run(&RunRequest::for_suburb("auckland", "  "), today()).await;
        assert!(report.is_aborted());
        assert_eq!(report.error.as_deref(), Some("invalid request: suburb required"));
        assert!(report.properties.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_renderer_for_empty_list() {
        let config = config();
        let list = list_url(&config, "auckland/ponsonby", 1);
        let direct = MockFetcher::direct()
            .with_page(&list, "<div id=app></div>")
            .with_page(
                &profile(&config, "one"),
                &record_page("1 One St, Ponsonby", "$1,100,000", "1 Dec 2025"),
            )
            .with_page(
                &profile(&config, "two"),
                &record_page("2 Two St, Ponsonby", "$1,300,000", "2 Dec 2025"),
            );
        let rendered = MockFetcher::rendered().with_page(&list, LIST);

        let pipeline = Pipeline::new(config, Arc::new(direct), Arc::new(MockWebSearcher::new()))
            .unwrap()
            .with_renderer(Arc::new(rendered.clone()));

        let request = RunRequest::for_suburb("auckland", "Ponsonby")
            .with_max_pages(1)
            .with_debug(true);
        let report = pipeline.run(&request, today()).await;

        assert!(!report.is_aborted());
        assert_eq!(report.properties.len(), 2);
        let debug = report.debug.unwrap();
        assert_eq!(
            debug.source_attempts[0].strategy,
            Some(crate::traits::fetcher::FetchStrategy::Rendered)
        );
        assert_eq!(debug.source_attempts[0].strategies_tried, 2);
        assert_eq!(rendered.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_renderer_unavailable_aborts_run() {
        let config = config();
        let list = list_url(&config, "auckland/ponsonby", 1);
        let direct = MockFetcher::direct().with_page(&list, "<div></div>");
        let rendered =
            MockFetcher::rendered().failing_with(|| FetchError::RendererUnavailable("no browser".into()));

        let pipeline = Pipeline::new(config, Arc::new(direct), Arc::new(MockWebSearcher::new()))
            .unwrap()
            .with_renderer(Arc::new(rendered));

        let report = pipeline
            .run(&RunRequest::for_suburb("auckland", "ponsonby"), today())
            .await;
        assert!(report.is_aborted());
        assert!(report.error.unwrap().contains("no browser"));
        assert!(report.agent_rankings.is_empty());
    }

    #[tokio::test]
    async fn test_renderer_ignored_when_disabled() {
        let mut config = config();
        config.fetch.rendering_enabled = false;
        let rendered = MockFetcher::rendered();

        let pipeline = Pipeline::new(
            config,
            Arc::new(MockFetcher::direct()),
            Arc::new(MockWebSearcher::new()),
        )
        .unwrap()
        .with_renderer(Arc::new(rendered.clone()));

        let report = pipeline
            .run(&RunRequest::for_suburb("auckland", "ponsonby").with_max_sources(1), today())
            .await;
        assert!(!report.is_aborted());
        assert!(rendered.calls().is_empty());
        assert!(report.warning.unwrap().contains("No sold properties found"));
    }

    #[tokio::test]
    async fn test_failed_list_fetch_is_counted() {
        let pipeline = Pipeline::new(
            config(),
            Arc::new(MockFetcher::direct()),
            Arc::new(MockWebSearcher::new()),
        )
        .unwrap();

        let request = RunRequest::for_suburb("auckland", "ponsonby")
            .with_max_sources(1)
            .with_debug(true);
        let report = pipeline.run(&request, today()).await;
        let debug = report.debug.unwrap();
        // both pages of the one source are tried
        assert_eq!(debug.drop_reasons.get(&DropReason::ListFetchFailed), Some(&2));
        assert_eq!(debug.source_attempts.len(), 2);
        assert_eq!(debug.sources_tried, 1);
        assert!(debug.source_attempts[0].error.as_deref().unwrap().contains("404"));
    }
}
