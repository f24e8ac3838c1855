//! Leaderboard aggregation.
//!
//! Records are grouped by `(lowercased agent name, agency)`. A record with
//! several agent names credits each of them.

use chrono::NaiveDate;
use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::types::ranking::AgentRanking;
use crate::types::record::{round2, SaleRecord};

/// Rankings plus whether the threshold had to be relaxed to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub rankings: Vec<AgentRanking>,
    pub relaxed: bool,
}

struct Group<'a> {
    agent_name: &'a str,
    agency_name: &'a str,
    pcts: Vec<f64>,
    most_recent: Option<NaiveDate>,
    example: &'a SaleRecord,
}

impl Group<'_> {
    fn ranking(&self) -> AgentRanking {
        let count = self.pcts.len();
        let sum: f64 = self.pcts.iter().sum();
        let max = self.pcts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        AgentRanking {
            agent_name: self.agent_name.to_string(),
            agency_name: self.agency_name.to_string(),
            sales_count: count,
            avg_over_valuation_pct: round2(sum / count as f64),
            max_over_valuation_pct: max,
            most_recent_sale_date: self.most_recent,
            example_address: self.example.address.clone(),
            example_url: self.example.source_url.clone(),
        }
    }
}

/// Average desc, then sales count desc, then most recent sale desc
/// (undated last).
pub fn compare_rankings(a: &AgentRanking, b: &AgentRanking) -> Ordering {
    b.avg_over_valuation_pct
        .total_cmp(&a.avg_over_valuation_pct)
        .then_with(|| b.sales_count.cmp(&a.sales_count))
        .then_with(|| b.most_recent_sale_date.cmp(&a.most_recent_sale_date))
}

/// Group attributed records and rank agents with at least `min_sales`
/// sales. If no group qualifies but some exist, the threshold drops to 1.
pub fn rank_agents(records: &[SaleRecord], min_sales: usize) -> RankOutcome {
    let mut groups: IndexMap<(String, String), Group<'_>> = IndexMap::new();

    for record in records.iter().filter(|r| r.is_attributed()) {
        for name in &record.agent_names {
            let key = (name.to_lowercase(), record.agency_name.clone());
            let group = groups.entry(key).or_insert_with(|| Group {
                agent_name: name,
                agency_name: &record.agency_name,
                pcts: Vec::new(),
                most_recent: None,
                example: record,
            });
            group.pcts.push(record.over_valuation_pct);
            group.most_recent = group.most_recent.max(record.sold_date);
        }
    }

    let qualifying = |threshold: usize| -> Vec<AgentRanking> {
        groups
            .values()
            .filter(|g| g.pcts.len() >= threshold)
            .map(Group::ranking)
            .collect()
    };

    let mut rankings = qualifying(min_sales.max(1));
    let relaxed = rankings.is_empty() && !groups.is_empty();
    if relaxed {
        rankings = qualifying(1);
    }

    // stable: groups tied on every key keep first-seen order
    rankings.sort_by(compare_rankings);
    RankOutcome { rankings, relaxed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::SourceKind;

    fn sale(address: &str, price: u64, cv: u64, date: (i32, u32, u32), agents: &[&str], agency: &str) -> SaleRecord {
        let mut record = SaleRecord::new(address, price, cv, format!("https://s.nz/{address}"), SourceKind::TradeMe)
            .unwrap()
            .with_sold_date(NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(), "");
        let agents: Vec<String> = agents.iter().map(|a| a.to_string()).collect();
        record.attribute(&agents, agency, "https://raywhite.co.nz/x", 3);
        record
    }

    #[test]
    fn test_group_metrics() {
        let records = vec![
            sale("1 A St", 1_200_000, 1_000_000, (2025, 3, 1), &["Jane Doe"], "Ray White"),
            sale("2 B St", 1_100_000, 1_000_000, (2025, 6, 1), &["jane doe"], "Ray White"),
            sale("3 C St", 900_000, 1_000_000, (2025, 1, 1), &["Jane Doe"], "Harcourts"),
        ];
        let outcome = rank_agents(&records, 2);
        assert!(!outcome.relaxed);
        assert_eq!(outcome.rankings.len(), 1);

        let jane = &outcome.rankings[0];
        assert_eq!(jane.agent_name, "Jane Doe");
        assert_eq!(jane.agency_name, "Ray White");
        assert_eq!(jane.sales_count, 2);
        assert_eq!(jane.avg_over_valuation_pct, 15.0);
        assert_eq!(jane.max_over_valuation_pct, 20.0);
        assert_eq!(jane.most_recent_sale_date, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(jane.example_address, "1 A St");
    }

    #[test]
    fn test_tie_break_on_recent_sale() {
        let records = vec![
            sale("1 A St", 1_100_000, 1_000_000, (2025, 3, 1), &["Old Agent"], "Ray White"),
            sale("2 B St", 1_100_000, 1_000_000, (2025, 9, 1), &["New Agent"], "Ray White"),
        ];
        let outcome = rank_agents(&records, 1);
        let names: Vec<_> = outcome.rankings.iter().map(|r| r.agent_name.as_str()).collect();
        assert_eq!(names, vec!["New Agent", "Old Agent"]);
    }

    #[test]
    fn test_count_breaks_tie_before_date() {
        let records = vec![
            sale("1 A St", 1_100_000, 1_000_000, (2025, 9, 1), &["Solo Agent"], "Ray White"),
            sale("2 B St", 1_100_000, 1_000_000, (2025, 1, 1), &["Busy Agent"], "Harcourts"),
            sale("3 C St", 1_100_000, 1_000_000, (2025, 1, 2), &["Busy Agent"], "Harcourts"),
        ];
        let outcome = rank_agents(&records, 1);
        assert_eq!(outcome.rankings[0].agent_name, "Busy Agent");
    }

    #[test]
    fn test_threshold_relaxes_to_one() {
        let records = vec![
            sale("1 A St", 1_300_000, 1_000_000, (2025, 3, 1), &["Jane Doe"], "Ray White"),
            sale("2 B St", 1_100_000, 1_000_000, (2025, 6, 1), &["John Roe"], "Bayleys"),
        ];
        let outcome = rank_agents(&records, 2);
        assert!(outcome.relaxed);
        assert_eq!(outcome.rankings.len(), 2);
        assert_eq!(outcome.rankings[0].agent_name, "Jane Doe");
    }

    #[test]
    fn test_unattributed_records_are_ignored() {
        let unattributed =
            SaleRecord::new("9 Z St", 1_000_000, 900_000, "https://s.nz/9", SourceKind::TradeMe).unwrap();
        let outcome = rank_agents(&[unattributed], 2);
        assert!(outcome.rankings.is_empty());
        assert!(!outcome.relaxed);
    }

    #[test]
    fn test_every_named_agent_is_credited() {
        let records = vec![sale(
            "1 A St",
            1_200_000,
            1_000_000,
            (2025, 3, 1),
            &["Jane Doe", "John Roe"],
            "Ray White",
        )];
        let outcome = rank_agents(&records, 1);
        assert_eq!(outcome.rankings.len(), 2);
        assert!(outcome.rankings.iter().all(|r| r.sales_count == 1));
    }
}
