//! Run pipeline: extraction, filtering, attribution and ranking, plus the
//! [`Pipeline`] that drives them over the discovered sources.

pub mod attribute;
pub mod extract;
pub mod filter;
pub mod rank;
pub mod run;

pub use attribute::{
    build_queries, classify, street_line, Attribution, AttributionAttempt, Attributor, CandidateEvidence,
    ConfidenceTier, EvidenceReader, Signal,
};
pub use extract::{extract_facts, screen, window_cutoff, Screening};
pub use filter::RecordSet;
pub use rank::{compare_rankings, rank_agents, RankOutcome};
pub use run::Pipeline;
