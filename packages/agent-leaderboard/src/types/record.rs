//! Sale records: one observed property transaction each.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Site a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum SourceKind {
    /// Sold-property profile pages of the primary listing site.
    TradeMe,
}

/// Facts read off a record page before any acceptance filter.
///
/// Every field is optional: source pages routinely omit some of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFacts {
    pub address: Option<String>,
    pub sold_price: Option<u64>,
    pub sold_date: Option<NaiveDate>,
    pub sold_date_raw: Option<String>,
    pub capital_value: Option<u64>,
    pub capital_value_updated: Option<String>,
}

/// A property sale accepted into the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub address: String,
    pub sold_date: Option<NaiveDate>,
    pub sold_date_raw_text: String,
    pub sold_price: u64,
    pub capital_value: u64,
    pub capital_value_updated: Option<String>,
    pub source_url: String,
    pub source_kind: SourceKind,
    pub over_valuation_pct: f64,
    pub agent_names: Vec<String>,
    pub agency_name: String,
    pub agent_source_url: String,
}

impl SaleRecord {
    /// Materialize a record. Returns `None` unless price and capital
    /// value are both present and positive.
    pub fn new(
        address: impl Into<String>,
        sold_price: u64,
        capital_value: u64,
        source_url: impl Into<String>,
        source_kind: SourceKind,
    ) -> Option<Self> {
        if sold_price == 0 || capital_value == 0 {
            return None;
        }
        Some(Self {
            address: address.into(),
            sold_date: None,
            sold_date_raw_text: String::new(),
            sold_price,
            capital_value,
            capital_value_updated: None,
            source_url: source_url.into(),
            source_kind,
            over_valuation_pct: over_valuation_pct(sold_price, capital_value),
            agent_names: Vec::new(),
            agency_name: String::new(),
            agent_source_url: String::new(),
        })
    }

    pub fn with_sold_date(mut self, date: NaiveDate, raw: impl Into<String>) -> Self {
        self.sold_date = Some(date);
        self.sold_date_raw_text = raw.into();
        self
    }

    pub fn with_capital_value_updated(mut self, updated: Option<String>) -> Self {
        self.capital_value_updated = updated;
        self
    }

    /// Lowercased address used as the dedup key.
    pub fn address_key(&self) -> String {
        self.address.to_lowercase()
    }

    pub fn is_attributed(&self) -> bool {
        !self.agent_names.is_empty() && !self.agency_name.is_empty()
    }

    /// Store a winning attribution on the record.
    pub fn attribute(&mut self, agents: &[String], agency: &str, source_url: &str, keep: usize) {
        self.agent_names = agents.iter().take(keep).cloned().collect();
        self.agency_name = agency.to_string();
        self.agent_source_url = source_url.to_string();
    }
}

/// `(price - cv) / cv * 100`, rounded to 2 decimals.
pub fn over_valuation_pct(sold_price: u64, capital_value: u64) -> f64 {
    let price = sold_price as f64;
    let cv = capital_value as f64;
    round2((price - cv) / cv * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_valuation_pct() {
        assert_eq!(over_valuation_pct(1_200_000, 1_000_000), 20.0);
        assert_eq!(over_valuation_pct(900_000, 1_000_000), -10.0);
        assert_eq!(over_valuation_pct(1_000_000, 3_000_000), -66.67);
    }

    #[test]
    fn test_record_requires_positive_amounts() {
        assert!(SaleRecord::new("1 A St", 0, 500_000, "u", SourceKind::TradeMe).is_none());
        assert!(SaleRecord::new("1 A St", 500_000, 0, "u", SourceKind::TradeMe).is_none());
        let record = SaleRecord::new("1 A St", 1_200_000, 1_000_000, "u", SourceKind::TradeMe)
            .unwrap();
        assert_eq!(record.over_valuation_pct, 20.0);
        assert!(!record.is_attributed());
    }

    #[test]
    fn test_attribute_keeps_first_names() {
        let mut record =
            SaleRecord::new("1 A St", 1_200_000, 1_000_000, "u", SourceKind::TradeMe).unwrap();
        let names: Vec<String> = ["Ann Lee", "Bo Chen", "Cy Park", "Di Ross"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        record.attribute(&names, "Ray White", "https://raywhite.co.nz/x", 3);
        assert_eq!(record.agent_names.len(), 3);
        assert_eq!(record.agent_names[2], "Cy Park");
        assert!(record.is_attributed());
    }

    #[test]
    fn test_serializes_camel_case_with_iso_date() {
        let record = SaleRecord::new("1 A St", 1_200_000, 1_000_000, "u", SourceKind::TradeMe)
            .unwrap()
            .with_sold_date(NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(), "15 Oct 2025");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["soldDate"], "2025-10-15");
        assert_eq!(json["soldDateRawText"], "15 Oct 2025");
        assert_eq!(json["overValuationPct"], 20.0);
        assert_eq!(json["sourceKind"], "trade-me");
    }
}
