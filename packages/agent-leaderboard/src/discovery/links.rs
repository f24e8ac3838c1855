//! Record-page link extraction from list pages.
//!
//! Links show up three ways: absolute hrefs, relative hrefs, and inside
//! hydration payloads in `<script>` blocks where the slashes are JSON
//! escaped (`\/`, `\\/` or `\u002F`).

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{PipelineError, PipelineResult};
use crate::types::config::SiteConfig;

static RE_SCRIPT_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap());
static RE_ESCAPED_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\\+u002f|\\+/").unwrap());

/// Slug characters allowed after the record path.
const SLUG_CHARS: &str = r#"[^\s"'<>\\?#,)]+"#;

/// Pulls record-profile URLs for one site out of list-page HTML.
#[derive(Debug, Clone)]
pub struct RecordLinkExtractor {
    pattern: Regex,
    origin: String,
    record_path: String,
}

impl RecordLinkExtractor {
    pub fn new(site: &SiteConfig) -> PipelineResult<Self> {
        let host = regex::escape(site.bare_host());
        let path = regex::escape(&site.record_path);
        let pattern = Regex::new(&format!(
            r"(https?://(?:www\.)?{host})?{path}({SLUG_CHARS})"
        ))
        .map_err(|e| PipelineError::Config(format!("record link pattern: {e}")))?;

        Ok(Self {
            pattern,
            origin: site.origin.clone(),
            record_path: site.record_path.clone(),
        })
    }

    /// Absolute record URLs in first-seen order, deduplicated.
    pub fn extract(&self, html: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        let mut push = |slug: &str| {
            let slug = slug.trim_end_matches(['/', '.']);
            if slug.is_empty() {
                return;
            }
            let url = format!("{}{}{}", self.origin, self.record_path, slug);
            if seen.insert(url.clone()) {
                links.push(url);
            }
        };

        for caps in self.pattern.captures_iter(html) {
            if let Some(slug) = Self::slug(&caps, html) {
                push(slug);
            }
        }

        for body in RE_SCRIPT_BODY.captures_iter(html).filter_map(|c| c.get(1)) {
            let unescaped = RE_ESCAPED_SLASH.replace_all(body.as_str(), "/");
            for caps in self.pattern.captures_iter(&unescaped) {
                if let Some(slug) = Self::slug(&caps, &unescaped) {
                    push(slug);
                }
            }
        }

        links
    }

    /// The slug of a match, unless the record path is the tail of a URL on
    /// another host.
    fn slug<'h>(caps: &regex::Captures<'h>, haystack: &str) -> Option<&'h str> {
        let whole = caps.get(0)?;
        if caps.get(1).is_none() {
            let before = haystack[..whole.start()].chars().next_back();
            if before.is_some_and(|c| c.is_alphanumeric() || ".-_:/".contains(c)) {
                return None;
            }
        }
        caps.get(2).map(|m| m.as_str())
    }
}
