//! Dollar amount parsing.
//!
//! Whitespace inside an amount (`$ 1 875 000`) is removed first, then a
//! magnitude-suffixed amount (`$1.65M`, `$650k`) is preferred over a plain
//! one (`$1,875,000`).

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static RE_SUFFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\d+(?:,\d{3})*(?:\.\d+)?)([mMkK])(?:[^A-Za-z]|$)").unwrap()
});
static RE_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?").unwrap());

/// First amount in `text`, with no plausibility floor.
pub fn parse_currency(text: &str) -> Option<u64> {
    parse_currency_min(text, 0)
}

/// First amount in `text` that is at least `min`.
///
/// Suffixed amounts are tried before plain ones.
pub fn parse_currency_min(text: &str, min: u64) -> Option<u64> {
    let compact = compact_amounts(text);
    let (suffixed, plain) = scan(&compact);
    suffixed
        .into_iter()
        .chain(plain)
        .map(|(_, amount)| amount)
        .find(|amount| *amount >= min)
}

/// Every amount of at least `min`, in order of appearance.
pub fn find_amounts(text: &str, min: u64) -> Vec<u64> {
    let compact = compact_amounts(text);
    let (suffixed, plain) = scan(&compact);
    let mut all: Vec<(Range<usize>, u64)> = suffixed.into_iter().chain(plain).collect();
    all.sort_by_key(|(span, _)| span.start);
    all.into_iter()
        .map(|(_, amount)| amount)
        .filter(|amount| *amount >= min)
        .collect()
}

type Found = Vec<(Range<usize>, u64)>;

fn scan(compact: &str) -> (Found, Found) {
    let mut suffixed: Found = Vec::new();
    for caps in RE_SUFFIXED.captures_iter(compact) {
        let (Some(whole), Some(number), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let multiplier = match unit.as_str() {
            "m" | "M" => 1_000_000.0,
            _ => 1_000.0,
        };
        if let Some(amount) = to_whole_units(number.as_str(), multiplier) {
            suffixed.push((whole.range(), amount));
        }
    }

    let mut plain: Found = Vec::new();
    for caps in RE_PLAIN.captures_iter(compact) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let overlaps = suffixed
            .iter()
            .any(|(span, _)| span.start < whole.end() && whole.start() < span.end);
        if overlaps {
            continue;
        }
        if let Some(amount) = to_whole_units(number.as_str(), 1.0) {
            plain.push((whole.range(), amount));
        }
    }

    (suffixed, plain)
}

fn to_whole_units(number: &str, multiplier: f64) -> Option<u64> {
    let value: f64 = number.replace(',', "").parse().ok()?;
    let scaled = (value * multiplier).round();
    if !scaled.is_finite() || scaled < 0.0 || scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

/// Drop whitespace that splits an amount: right after `$`, or between
/// digit groups of three.
fn compact_amounts(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_amount = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !c.is_whitespace() {
            in_amount = c == '$' || (in_amount && (c.is_ascii_digit() || c == ',' || c == '.'));
            out.push(c);
            i += 1;
            continue;
        }

        let mut next = i;
        while next < chars.len() && chars[next].is_whitespace() {
            next += 1;
        }
        let prev = out.chars().last();
        let digit_at = |k: usize| chars.get(k).is_some_and(|d| d.is_ascii_digit());
        let joins = match prev {
            Some('$') => digit_at(next),
            Some(p) if in_amount && p.is_ascii_digit() => {
                digit_at(next) && digit_at(next + 1) && digit_at(next + 2) && !digit_at(next + 3)
            }
            _ => false,
        };
        if !joins {
            out.push(' ');
            in_amount = false;
        }
        i = next;
    }
    out
}
