//! List discovery: which list pages to request, and which record links
//! they contain.

pub mod insights_api;
pub mod links;
pub mod sources;

pub use insights_api::{InsightsApiClient, InsightsSource};
pub use links::RecordLinkExtractor;
pub use sources::{build_sources, slugify, ListSource};

use std::collections::HashSet;

use crate::types::config::RunRequest;
use crate::types::run::SourceAttempt;

/// Stop rule for the source cascade, computed from the attempt log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBudget {
    pub min_records: usize,
    pub max_sources: usize,
}

impl SourceBudget {
    pub fn new(min_records: usize, max_sources: usize) -> Self {
        Self {
            min_records,
            max_sources,
        }
    }

    pub fn from_request(request: &RunRequest) -> Self {
        Self::new(request.min_records, request.max_sources)
    }

    /// Whether another source may be started.
    ///
    /// Stops once `accepted` reaches the record target or the number of
    /// distinct sources in `attempts` reaches the cap.
    pub fn should_continue(&self, attempts: &[SourceAttempt], accepted: usize) -> bool {
        !self.target_met(accepted) && distinct_sources(attempts) < self.max_sources
    }

    /// Whether the record target is met; checked between pages of one source.
    pub fn target_met(&self, accepted: usize) -> bool {
        accepted >= self.min_records
    }
}

fn distinct_sources(attempts: &[SourceAttempt]) -> usize {
    attempts
        .iter()
        .map(|a| a.source.as_str())
        .collect::<HashSet<_>>()
        .len()
}
