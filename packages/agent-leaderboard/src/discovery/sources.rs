//! Candidate list sources for a target area.
//!
//! Order matters: primary first, then the district and broad fallbacks,
//! then one source per adjacent suburb. Each source expands to pages
//! `1..=max_pages`.

use crate::types::config::{RunRequest, SiteConfig};
use crate::types::run::SourceRole;

/// One distinct list origin and its page URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSource {
    /// Stable identity, e.g. `primary:auckland/ponsonby`
    pub id: String,
    pub role: SourceRole,
    /// `(page number, url)` in page order
    pub pages: Vec<(usize, String)>,
}

/// Lowercase, hyphen-separated URL slug.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Ordered list sources for `request`.
///
/// Sources whose area path repeats an earlier one are skipped, so a
/// district equal to the region does not produce a second copy of the
/// primary source.
pub fn build_sources(site: &SiteConfig, request: &RunRequest) -> Vec<ListSource> {
    let region = slugify(&request.region);
    let suburb = slugify(&request.suburb);
    let district = request
        .district
        .as_deref()
        .map(slugify)
        .filter(|d| !d.is_empty());

    let mut areas: Vec<(SourceRole, String)> = vec![(SourceRole::Primary, format!("{region}/{suburb}"))];
    if let Some(district) = &district {
        areas.push((SourceRole::DistrictFallback, format!("{district}/{suburb}")));
        areas.push((SourceRole::BroadFallback, format!("{region}/{district}")));
    }
    for adjacent in &request.adjacent_suburbs {
        let slug = slugify(adjacent);
        if !slug.is_empty() {
            areas.push((SourceRole::Adjacent(slug.clone()), format!("{region}/{slug}")));
        }
    }

    let mut seen: Vec<String> = Vec::new();
    let mut sources = Vec::new();
    for (role, area) in areas {
        if seen.contains(&area) {
            continue;
        }
        seen.push(area.clone());

        let pages = (1..=request.max_pages)
            .map(|page| (page, list_url(site, &area, request.rows_per_page, page)))
            .collect();
        sources.push(ListSource {
            id: format!("{}:{}", role_label(&role), area),
            role,
            pages,
        });
    }
    sources
}

fn list_url(site: &SiteConfig, area: &str, rows: usize, page: usize) -> String {
    format!(
        "{}{}{}?rows={}&page={}",
        site.origin,
        site.list_path,
        area,
        rows,
        page
    )
}

fn role_label(role: &SourceRole) -> &'static str {
    match role {
        SourceRole::InsightsApi => "insights-api",
        SourceRole::Primary => "primary",
        SourceRole::DistrictFallback => "district",
        SourceRole::BroadFallback => "broad",
        SourceRole::Adjacent(_) => "adjacent",
    }
}
