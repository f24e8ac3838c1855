//! Record extraction: fact parsers over one record page, then screening.

use chrono::{Months, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::parsers::{
    before_valuation_label, normalize_text, parse_address, parse_currency_min, parse_date, parse_valuation,
    windows_after,
};
use crate::types::config::ParseConfig;
use crate::types::record::{RecordFacts, SaleRecord, SourceKind};
use crate::types::run::DropReason;

static RE_PRICE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sold\s+for|sale\s+price|sold\s+price|sold)\b").unwrap()
});
static RE_DATE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:sold|sale\s+date|date\s+sold)\b").unwrap());

/// Read every fact a record page offers. Never fails.
pub fn extract_facts(html: &str, config: &ParseConfig) -> RecordFacts {
    let text = normalize_text(html);
    let valuation = parse_valuation(&text, config.valuation_window, config.min_plausible_amount);

    // a sale label with no price of its own must not reach into the valuation block
    let sold_price = windows_after(&text, &RE_PRICE_LABEL, config.sale_label_window)
        .find_map(|w| parse_currency_min(before_valuation_label(w), config.min_plausible_amount));
    let sold = windows_after(&text, &RE_DATE_LABEL, config.sale_label_window).find_map(parse_date);

    RecordFacts {
        address: parse_address(html),
        sold_price,
        sold_date: sold.as_ref().map(|d| d.date),
        sold_date_raw: sold.map(|d| d.raw),
        capital_value: valuation.amount,
        capital_value_updated: valuation.updated,
    }
}

/// Earliest sale date inside a window of `months` ending at `today`.
pub fn window_cutoff(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Result of the acceptance filter for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum Screening {
    Accepted(SaleRecord),
    Dropped(DropReason),
    /// No usable address: skipped without a drop reason
    Unidentified,
}

/// Apply the acceptance filter in its fixed order: price, capital value,
/// date, recency window, address.
///
/// Duplicate addresses are the record set's concern, not this function's.
pub fn screen(facts: RecordFacts, source_url: &str, cutoff: NaiveDate) -> Screening {
    let Some(price) = facts.sold_price.filter(|p| *p > 0) else {
        return Screening::Dropped(DropReason::NoPrice);
    };
    let Some(cv) = facts.capital_value.filter(|c| *c > 0) else {
        return Screening::Dropped(DropReason::NoCv);
    };
    let Some(date) = facts.sold_date else {
        return Screening::Dropped(DropReason::ParseFailDate);
    };
    if date < cutoff {
        return Screening::Dropped(DropReason::OutsideWindow);
    }
    let address = facts.address.unwrap_or_default();
    if address.trim().is_empty() {
        return Screening::Unidentified;
    }

    match SaleRecord::new(address, price, cv, source_url, SourceKind::TradeMe) {
        Some(record) => Screening::Accepted(
            record
                .with_sold_date(date, facts.sold_date_raw.unwrap_or_default())
                .with_capital_value_updated(facts.capital_value_updated),
        ),
        None => Screening::Dropped(DropReason::NoPrice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><meta property="og:title" content="12 Smith Street, Ponsonby"></head>
        <body>
          <h1>12 Smith Street, Ponsonby</h1>
          <section>Sold on 15 Oct 2025 for $1,200,000</section>
          <section>Capital Value $1,000,000 Updated: September 2024</section>
        </body></html>
    "#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_extract_facts() {
        let facts = extract_facts(PAGE, &ParseConfig::default());
        assert_eq!(facts.address.as_deref(), Some("12 Smith Street, Ponsonby"));
        assert_eq!(facts.sold_price, Some(1_200_000));
        assert_eq!(facts.capital_value, Some(1_000_000));
        assert_eq!(facts.sold_date, NaiveDate::from_ymd_opt(2025, 10, 15));
        assert_eq!(facts.sold_date_raw.as_deref(), Some("15 Oct 2025"));
        assert_eq!(facts.capital_value_updated.as_deref(), Some("September 2024"));
    }

    #[test]
    fn test_suffixed_sale_price() {
        let html = "<h1>3 Hill Rd</h1><p>Sold for $1.65M on 2/9/25</p><p>CV $1,500,000</p>";
        let facts = extract_facts(html, &ParseConfig::default());
        assert_eq!(facts.sold_price, Some(1_650_000));
        assert_eq!(facts.sold_date, NaiveDate::from_ymd_opt(2025, 9, 2));
    }

    #[test]
    fn test_withheld_price_is_not_the_valuation() {
        let html = "<h1>1 A St</h1><p>Sold on 15 Oct 2025. Price withheld.</p><p>Capital Value $1,000,000</p>";
        let facts = extract_facts(html, &ParseConfig::default());
        assert_eq!(facts.sold_price, None);
        assert_eq!(facts.capital_value, Some(1_000_000));
        assert_eq!(facts.sold_date, NaiveDate::from_ymd_opt(2025, 10, 15));

        let cutoff = window_cutoff(today(), 12);
        assert_eq!(
            screen(facts, "https://site.nz/p/1", cutoff),
            Screening::Dropped(DropReason::NoPrice)
        );
    }

    #[test]
    fn test_screen_accepts_and_derives_pct() {
        let facts = extract_facts(PAGE, &ParseConfig::default());
        let cutoff = window_cutoff(today(), 12);
        match screen(facts, "https://site.nz/p/1", cutoff) {
            Screening::Accepted(record) => {
                assert_eq!(record.over_valuation_pct, 20.0);
                assert_eq!(record.sold_date_raw_text, "15 Oct 2025");
                assert_eq!(record.source_url, "https://site.nz/p/1");
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn test_screen_order() {
        let cutoff = window_cutoff(today(), 12);
        let full = RecordFacts {
            address: Some("12 Smith St".into()),
            sold_price: Some(900_000),
            sold_date: NaiveDate::from_ymd_opt(2025, 12, 1),
            sold_date_raw: Some("1/12/2025".into()),
            capital_value: Some(800_000),
            capital_value_updated: None,
        };

        let no_anything = RecordFacts::default();
        assert_eq!(screen(no_anything, "u", cutoff), Screening::Dropped(DropReason::NoPrice));

        let no_cv = RecordFacts {
            capital_value: None,
            sold_date: None,
            ..full.clone()
        };
        assert_eq!(screen(no_cv, "u", cutoff), Screening::Dropped(DropReason::NoCv));

        let no_date = RecordFacts {
            sold_date: None,
            ..full.clone()
        };
        assert_eq!(screen(no_date, "u", cutoff), Screening::Dropped(DropReason::ParseFailDate));

        let no_address = RecordFacts {
            address: Some("   ".into()),
            ..full.clone()
        };
        assert_eq!(screen(no_address, "u", cutoff), Screening::Unidentified);
    }

    #[test]
    fn test_window_filter() {
        let cutoff = window_cutoff(today(), 12);
        let base = RecordFacts {
            address: Some("1 Old Rd".into()),
            sold_price: Some(900_000),
            capital_value: Some(800_000),
            ..RecordFacts::default()
        };

        let thirteen_months_ago = RecordFacts {
            sold_date: NaiveDate::from_ymd_opt(2024, 12, 15),
            ..base.clone()
        };
        assert_eq!(
            screen(thirteen_months_ago, "u", cutoff),
            Screening::Dropped(DropReason::OutsideWindow)
        );

        let one_month_ago = RecordFacts {
            sold_date: NaiveDate::from_ymd_opt(2025, 12, 15),
            ..base
        };
        assert!(matches!(screen(one_month_ago, "u", cutoff), Screening::Accepted(_)));
    }

    #[test]
    fn test_cutoff_day_is_inclusive() {
        let cutoff = window_cutoff(today(), 12);
        assert_eq!(cutoff, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        let facts = RecordFacts {
            address: Some("2 Edge St".into()),
            sold_price: Some(500_000),
            capital_value: Some(400_000),
            sold_date: Some(cutoff),
            ..RecordFacts::default()
        };
        assert!(matches!(screen(facts, "u", cutoff), Screening::Accepted(_)));
    }
}
