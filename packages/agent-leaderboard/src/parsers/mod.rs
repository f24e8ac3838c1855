//! Heuristic fact parsers.
//!
//! Every parser is a pure, total function: a missing fact comes back as
//! `None`, never as an error, because source pages routinely omit fields.

pub mod address;
pub mod currency;
pub mod date;
pub mod text;
pub mod valuation;

pub use address::parse_address;
pub use currency::{find_amounts, parse_currency, parse_currency_min};
pub use date::{find_dates, month_number, parse_date, ParsedDate};
pub use text::{collapse_whitespace, contains_phrase, normalize_text, windows_after};
pub use valuation::{before_valuation_label, parse_valuation, Valuation};
