//! Address (page title) extraction.
//!
//! Prefers the primary heading, then `og:title`, then `twitter:title`.

use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::text::{collapse_whitespace, decode_entities};

static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static SEL_OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static SEL_TWITTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="twitter:title"]"#).unwrap());

/// First non-empty title candidate, whitespace-collapsed.
pub fn parse_address(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let heading = document
        .select(&SEL_H1)
        .map(|el| el.text().collect::<Vec<_>>().join(" "));
    let og = document
        .select(&SEL_OG_TITLE)
        .filter_map(|el| el.value().attr("content").map(str::to_string));
    let twitter = document
        .select(&SEL_TWITTER_TITLE)
        .filter_map(|el| el.value().attr("content").map(str::to_string));

    heading
        .chain(og)
        .chain(twitter)
        .map(|candidate| collapse_whitespace(&decode_entities(&candidate)))
        .find(|candidate| !candidate.is_empty())
}
