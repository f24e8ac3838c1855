//! Sale date parsing from free text.
//!
//! Two shapes are recognized: numeric `D/M/Y` (two-digit years are 20xx)
//! and `D Month Y` with a full or abbreviated month name. Day and month
//! ranges are checked, month length is not: a day past the end of its
//! month is clamped to the last day.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static RE_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").unwrap());
static RE_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b").unwrap()
});

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

/// A date plus the text it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub raw: String,
}

/// First recognizable date in `text`, by position.
pub fn parse_date(text: &str) -> Option<ParsedDate> {
    scan_dates(text).into_iter().next().map(|(_, parsed)| parsed)
}

/// Every recognizable date in `text`, in order of appearance.
pub fn find_dates(text: &str) -> Vec<NaiveDate> {
    scan_dates(text).into_iter().map(|(_, p)| p.date).collect()
}

/// Month number for a name or abbreviation, case-insensitive.
pub fn month_number(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();
    MONTHS
        .iter()
        .find(|(candidate, _)| *candidate == lower)
        .map(|(_, number)| *number)
}

fn scan_dates(text: &str) -> Vec<(usize, ParsedDate)> {
    let mut found = Vec::new();

    for caps in RE_NUMERIC.captures_iter(text) {
        let (Ok(day), Ok(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        let year = if year < 100 { 2000 + year } else { year };
        if let Some(date) = lenient_date(year, month, day) {
            let whole = caps.get(0).map(|m| (m.start(), m.as_str().to_string()));
            if let Some((start, raw)) = whole {
                found.push((start, ParsedDate { date, raw }));
            }
        }
    }

    for caps in RE_NAMED.captures_iter(text) {
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        let (Ok(day), Ok(year)) = (caps[1].parse::<u32>(), caps[3].parse::<i32>()) else {
            continue;
        };
        if let Some(date) = lenient_date(year, month, day) {
            let whole = caps.get(0).map(|m| (m.start(), m.as_str().to_string()));
            if let Some((start, raw)) = whole {
                found.push((start, ParsedDate { date, raw }));
            }
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found
}

fn lenient_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last_day = last_day_of_month(first);
    NaiveDate::from_ymd_opt(year, month, day.min(last_day))
}

fn last_day_of_month(first: NaiveDate) -> u32 {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
