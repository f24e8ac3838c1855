//! Ephemeral bookkeeping for one pipeline run and the output payload.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::traits::fetcher::FetchStrategy;
use crate::types::{config::RunRequest, ranking::AgentRanking, record::SaleRecord};

/// Lines of attribution log kept in the debug payload.
pub const ATTRIBUTION_LOG_TAIL: usize = 50;

/// Why a candidate was not shipped (or shipped without agent data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NoPrice,
    NoCv,
    ParseFailDate,
    OutsideWindow,
    DupAddress,
    AgentNotFound,
    FetchFailed,
    ListFetchFailed,
}

/// Which slot of the source cascade a list URL belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "area")]
pub enum SourceRole {
    InsightsApi,
    Primary,
    DistrictFallback,
    BroadFallback,
    Adjacent(String),
}

/// Outcome of requesting one list page (or one API call).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    /// Distinct source identity; pages of one source share it.
    pub source: String,
    pub role: SourceRole,
    pub url: String,
    pub page: usize,
    /// Strategy whose result was accepted, if any.
    pub strategy: Option<FetchStrategy>,
    pub strategies_tried: usize,
    pub links_found: usize,
    pub records_added: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of all attempts against one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTotals {
    pub pages: usize,
    pub links: usize,
    pub records: usize,
}

/// State accumulated over one run. Never stored.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub request: RunRequest,
    pub drops: BTreeMap<DropReason, usize>,
    pub attempts: Vec<SourceAttempt>,
    pub attribution_log: Vec<String>,
    pub warnings: Vec<String>,
}

impl PipelineRun {
    pub fn new(request: RunRequest) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            request,
            drops: BTreeMap::new(),
            attempts: Vec::new(),
            attribution_log: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn count_drop(&mut self, reason: DropReason) {
        *self.drops.entry(reason).or_insert(0) += 1;
    }

    pub fn drop_count(&self, reason: DropReason) -> usize {
        self.drops.get(&reason).copied().unwrap_or(0)
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Number of distinct sources that have been requested.
    pub fn sources_tried(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for attempt in &self.attempts {
            if !seen.contains(&attempt.source.as_str()) {
                seen.push(&attempt.source);
            }
        }
        seen.len()
    }

    /// Per-source totals in first-attempt order.
    pub fn source_totals(&self) -> IndexMap<String, SourceTotals> {
        let mut totals: IndexMap<String, SourceTotals> = IndexMap::new();
        for attempt in &self.attempts {
            let entry = totals.entry(attempt.source.clone()).or_default();
            entry.pages += 1;
            entry.links += attempt.links_found;
            entry.records += attempt.records_added;
        }
        totals
    }

    /// Warnings joined for the payload, if any.
    pub fn joined_warnings(&self) -> Option<String> {
        if self.warnings.is_empty() {
            None
        } else {
            Some(self.warnings.join("; "))
        }
    }

    pub fn debug_info(&self) -> DebugInfo {
        let skip = self
            .attribution_log
            .len()
            .saturating_sub(ATTRIBUTION_LOG_TAIL);
        DebugInfo {
            run_id: self.run_id,
            started_at: self.started_at,
            sources_tried: self.sources_tried(),
            source_totals: self.source_totals(),
            source_attempts: self.attempts.clone(),
            drop_reasons: self.drops.clone(),
            attribution_log_tail: self.attribution_log[skip..].to_vec(),
        }
    }
}

/// Diagnostic payload, emitted only on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sources_tried: usize,
    pub source_totals: IndexMap<String, SourceTotals>,
    pub source_attempts: Vec<SourceAttempt>,
    pub drop_reasons: BTreeMap<DropReason, usize>,
    pub attribution_log_tail: Vec<String>,
}

/// What a run returns to its caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardReport {
    pub agent_rankings: Vec<AgentRanking>,
    pub properties: Vec<SaleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl LeaderboardReport {
    /// Empty payload for an aborted run.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(source: &str, links: usize, records: usize) -> SourceAttempt {
        SourceAttempt {
            source: source.to_string(),
            role: SourceRole::Primary,
            url: format!("https://example.com/{source}"),
            page: 1,
            strategy: Some(FetchStrategy::Direct),
            strategies_tried: 1,
            links_found: links,
            records_added: records,
            error: None,
        }
    }

    #[test]
    fn test_drop_tally() {
        let mut run = PipelineRun::new(RunRequest::for_suburb("auckland", "ponsonby"));
        run.count_drop(DropReason::NoCv);
        run.count_drop(DropReason::NoCv);
        run.count_drop(DropReason::DupAddress);
        assert_eq!(run.drop_count(DropReason::NoCv), 2);
        assert_eq!(run.drop_count(DropReason::DupAddress), 1);
        assert_eq!(run.drop_count(DropReason::NoPrice), 0);
    }

    #[test]
    fn test_sources_tried_counts_distinct_sources() {
        let mut run = PipelineRun::new(RunRequest::for_suburb("auckland", "ponsonby"));
        run.attempts.push(attempt("primary", 10, 4));
        run.attempts.push(attempt("primary", 5, 2));
        run.attempts.push(attempt("adjacent:grey-lynn", 0, 0));
        assert_eq!(run.sources_tried(), 2);

        let totals = run.source_totals();
        assert_eq!(totals["primary"].pages, 2);
        assert_eq!(totals["primary"].links, 15);
        assert_eq!(totals["primary"].records, 6);
        assert_eq!(totals.get_index(1).unwrap().0, "adjacent:grey-lynn");
    }

    #[test]
    fn test_attribution_log_tail_is_bounded() {
        let mut run = PipelineRun::new(RunRequest::for_suburb("auckland", "ponsonby"));
        for i in 0..(ATTRIBUTION_LOG_TAIL + 10) {
            run.attribution_log.push(format!("line {i}"));
        }
        let debug = run.debug_info();
        assert_eq!(debug.attribution_log_tail.len(), ATTRIBUTION_LOG_TAIL);
        assert_eq!(debug.attribution_log_tail[0], "line 10");
    }

    #[test]
    fn test_report_omits_absent_fields() {
        let json = serde_json::to_value(LeaderboardReport::default()).unwrap();
        assert!(json.get("warning").is_none());
        assert!(json.get("debug").is_none());
        assert!(json["agentRankings"].as_array().unwrap().is_empty());

        let aborted = LeaderboardReport::aborted("renderer unavailable");
        assert!(aborted.is_aborted());
        assert!(aborted.properties.is_empty());
    }

    #[test]
    fn test_drop_reason_serializes_snake_case() {
        let mut run = PipelineRun::new(RunRequest::for_suburb("auckland", "ponsonby"));
        run.count_drop(DropReason::ParseFailDate);
        let json = serde_json::to_value(run.debug_info()).unwrap();
        assert_eq!(json["dropReasons"]["parse_fail_date"], 1);
    }
}
