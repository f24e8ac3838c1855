//! Per-agent aggregates over attributed sale records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRanking {
    pub agent_name: String,
    pub agency_name: String,
    pub sales_count: usize,
    pub avg_over_valuation_pct: f64,
    pub max_over_valuation_pct: f64,
    pub most_recent_sale_date: Option<NaiveDate>,
    /// First record seen for this agent.
    pub example_address: String,
    pub example_url: String,
}
