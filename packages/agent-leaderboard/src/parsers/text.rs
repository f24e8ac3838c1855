//! Markup stripping and whitespace normalization.
//!
//! Every fact parser runs over the output of [`normalize_text`], so the
//! page's visible text is reduced to a single line of single spaces.

use regex::Regex;
use std::sync::LazyLock;

static RE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static RE_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static RE_NOSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap());
static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]{1,6}|[0-9]{1,7});").unwrap());

/// Visible text of an HTML document, whitespace-collapsed.
pub fn normalize_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, " ");
    let text = RE_STYLE.replace_all(&text, " ");
    let text = RE_NOSCRIPT.replace_all(&text, " ");
    let text = RE_COMMENT.replace_all(&text, " ");
    let text = RE_TAG.replace_all(&text, " ");
    collapse_whitespace(&decode_entities(&text))
}

/// Collapse every whitespace run to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WS.replace_all(text, " ").trim().to_string()
}

/// Decode the handful of entities that show up in listing markup.
pub fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-");

    let numeric = RE_NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });

    // &amp; last so "&amp;nbsp;" stays literal
    numeric.replace("&amp;", "&")
}

/// Slices of `text` that follow each match of `label`, up to `window` chars.
///
/// Windows are cut on char boundaries so multi-byte text is safe.
pub fn windows_after<'a>(
    text: &'a str,
    label: &'a Regex,
    window: usize,
) -> impl Iterator<Item = &'a str> + 'a {
    label.find_iter(text).map(move |m| {
        let rest = &text[m.end()..];
        let end = rest
            .char_indices()
            .nth(window)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    })
}

/// Case-insensitive literal containment over normalized text.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = collapse_whitespace(needle).to_lowercase();
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markup_and_scripts() {
        let html = r#"
            <html><head><style>.x { color: red }</style>
            <script>window.__DATA__ = {"price": "$999"};</script></head>
            <body><h1>12 Smith   St</h1>
            <!-- hidden $5 -->
            <p>Sold&nbsp;for <b>$1.2M</b></p></body></html>
        "#;
        assert_eq!(normalize_text(html), "12 Smith St Sold for $1.2M");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Barfoot &amp; Thompson"), "Barfoot & Thompson");
        assert_eq!(decode_entities("&#36;650k &#x24;1M"), "$650k $1M");
        assert_eq!(decode_entities("&amp;nbsp;"), "&nbsp;");
    }

    #[test]
    fn test_windows_after_label() {
        let label = Regex::new(r"(?i)sold").unwrap();
        let text = "Sold for $1M. Previously sold in 2019";
        let windows: Vec<&str> = windows_after(text, &label, 8).collect();
        assert_eq!(windows, vec![" for $1M", " in 2019"]);
    }

    #[test]
    fn test_windows_respect_char_boundaries() {
        let label = Regex::new("Sold").unwrap();
        let windows: Vec<&str> = windows_after("Sold ½ — €", &label, 3).collect();
        assert_eq!(windows, vec![" ½ "]);
    }

    #[test]
    fn test_contains_phrase() {
        assert!(contains_phrase("Sold: 12 SMITH St, Ponsonby", "12 smith  st"));
        assert!(!contains_phrase("Sold: 14 Smith St", "12 Smith St"));
        assert!(!contains_phrase("anything", "  "));
    }
}
