//! Capital value / rateable value blocks.

use regex::Regex;
use std::sync::LazyLock;

use super::currency::parse_currency_min;
use super::text::windows_after;

static RE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?i:\bcapital\s+value\b)|(?i:\brateable\s+value\b)|\bCV\b|\bRV\b)").unwrap()
});
static RE_UPDATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bupdated:?\s*((?:\d{1,2}\s+)?[a-z]{3,9}\.?\s+\d{4}|\d{1,2}/\d{1,2}/\d{2,4})",
    )
    .unwrap()
});

/// Official valuation read from a record page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Valuation {
    pub amount: Option<u64>,
    /// Free-form "updated" phrase, kept verbatim.
    pub updated: Option<String>,
}

/// Find a valuation label followed, within `window` chars, by an amount of
/// at least `min_amount`; also pick up an `Updated:` phrase from the same
/// stretch of text.
pub fn parse_valuation(text: &str, window: usize, min_amount: u64) -> Valuation {
    let amount =
        windows_after(text, &RE_LABEL, window).find_map(|w| parse_currency_min(w, min_amount));
    let updated = windows_after(text, &RE_LABEL, window).find_map(|w| {
        RE_UPDATED
            .captures(w)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    });
    Valuation { amount, updated }
}

/// The part of `window` before any valuation label.
pub fn before_valuation_label(window: &str) -> &str {
    match RE_LABEL.find(window) {
        Some(m) => &window[..m.start()],
        None => window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capital_value_with_updated() {
        let text = "Property details Capital Value $1,050,000 Updated: September 2024 Land area 400m2";
        let valuation = parse_valuation(text, 80, 10_000);
        assert_eq!(valuation.amount, Some(1_050_000));
        assert_eq!(valuation.updated.as_deref(), Some("September 2024"));
    }

    #[test]
    fn test_abbreviated_labels() {
        assert_eq!(parse_valuation("CV: $980k", 80, 10_000).amount, Some(980_000));
        assert_eq!(
            parse_valuation("RV $1.1M (updated 1 Sep 2024)", 80, 10_000),
            Valuation {
                amount: Some(1_100_000),
                updated: Some("1 Sep 2024".to_string())
            }
        );
        assert_eq!(
            parse_valuation("rateable value - $720,000", 80, 10_000).amount,
            Some(720_000)
        );
    }

    #[test]
    fn test_amount_must_be_within_window() {
        let text = format!("Capital Value {} $900,000", "x".repeat(100));
        assert_eq!(parse_valuation(&text, 80, 10_000).amount, None);
    }

    #[test]
    fn test_lowercase_abbreviation_is_not_a_label() {
        assert_eq!(parse_valuation("cv $900,000", 80, 10_000).amount, None);
    }

    #[test]
    fn test_skips_implausible_amount_then_tries_next_label() {
        let text = "CV $500 ... Capital Value $1.3M";
        assert_eq!(parse_valuation(text, 20, 10_000).amount, Some(1_300_000));
    }

    #[test]
    fn test_updated_phrase_outside_valuation_block_ignored() {
        let text = format!(
            "Capital Value $1,050,000 {} Last updated 3 Jan 2026",
            "Land area 400m2. ".repeat(6)
        );
        let valuation = parse_valuation(&text, 80, 10_000);
        assert_eq!(valuation.amount, Some(1_050_000));
        assert_eq!(valuation.updated, None);
        assert_eq!(
            parse_valuation("Last updated 3 Jan 2026", 80, 10_000).updated,
            None
        );
    }

    #[test]
    fn test_before_valuation_label() {
        assert_eq!(before_valuation_label(" on 1 May 2025. CV $900,000"), " on 1 May 2025. ");
        assert_eq!(before_valuation_label(" for $1.2M"), " for $1.2M");
    }

    #[test]
    fn test_absent() {
        assert_eq!(parse_valuation("Sold for $1M", 80, 10_000), Valuation::default());
    }
}
