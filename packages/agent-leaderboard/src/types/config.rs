//! Configuration for the pipeline and its inbound run parameters.
//!
//! [`PipelineConfig`] is process-wide and read-only after startup.
//! [`RunRequest`] carries the per-invocation parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable process-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub parse: ParseConfig,
    pub extract: ExtractConfig,
    pub attribution: AttributionConfig,
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the rendered fetch fallback.
    pub fn with_rendering(mut self, enabled: bool) -> Self {
        self.fetch.rendering_enabled = enabled;
        self
    }

    /// Enable or disable the insights API discovery source.
    pub fn with_insights_api(mut self, enabled: bool) -> Self {
        self.site.insights_api_enabled = enabled;
        self
    }

    /// Replace the agency brand list.
    pub fn with_brands(mut self, brands: Vec<AgencyBrand>) -> Self {
        self.attribution.brands = brands;
        self
    }
}

/// The listing site whose sold-property pages are scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Scheme + host, no trailing slash.
    pub origin: String,

    /// Path prefix shared by every record (property profile) page.
    pub record_path: String,

    /// Path prefix of the sold-list pages; area slugs are appended.
    pub list_path: String,

    /// GraphQL endpoint of the insights API source.
    pub insights_api_url: String,

    /// Try the insights API before any list page.
    pub insights_api_enabled: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.trademe.co.nz".to_string(),
            record_path: "/a/property/insights/profile/".to_string(),
            list_path: "/a/property/insights/sold/".to_string(),
            insights_api_url: "https://api.trademe.co.nz/graphql/".to_string(),
            insights_api_enabled: false,
        }
    }
}

impl SiteConfig {
    /// Host part of the origin, without `www.`.
    pub fn bare_host(&self) -> &str {
        let host = self
            .origin
            .split("://")
            .nth(1)
            .unwrap_or(&self.origin)
            .trim_end_matches('/');
        host.strip_prefix("www.").unwrap_or(host)
    }

    /// Absolute URL of a record page given its profile slug.
    pub fn record_url(&self, slug: &str) -> String {
        format!(
            "{}{}{}",
            self.origin,
            self.record_path,
            slug.trim_start_matches('/')
        )
    }
}

/// Fetch strategies, timeouts and the rendering policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Round-robin pool for the direct strategy.
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub referer: String,

    /// Direct GET deadline.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Fall back to rendering when a direct list fetch yields no links.
    pub rendering_enabled: bool,

    /// Ceiling on concurrently open rendering sessions.
    pub render_concurrency: usize,

    #[serde(with = "duration_secs")]
    pub navigation_timeout: Duration,

    /// Pause after load and after consent dismissal.
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Pixels per scroll step.
    pub scroll_step: u32,

    #[serde(with = "duration_millis")]
    pub scroll_poll_interval: Duration,

    #[serde(with = "duration_secs")]
    pub scroll_timeout: Duration,

    /// Selectors tried, in order, to dismiss a consent dialog.
    pub consent_selectors: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15".to_string(),
            ],
            accept_language: "en-NZ,en;q=0.9".to_string(),
            referer: "https://www.trademe.co.nz/".to_string(),
            request_timeout: Duration::from_secs(30),
            rendering_enabled: true,
            render_concurrency: 2,
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(750),
            scroll_step: 800,
            scroll_poll_interval: Duration::from_millis(300),
            scroll_timeout: Duration::from_secs(20),
            consent_selectors: vec![
                "#onetrust-accept-btn-handler".to_string(),
                "button[aria-label='Accept cookies']".to_string(),
                "button[data-testid='consent-accept']".to_string(),
            ],
        }
    }
}

/// Thresholds used by the fact parsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Amounts below this are treated as incidental numbers.
    pub min_plausible_amount: u64,

    /// Characters scanned after a valuation label.
    pub valuation_window: usize,

    /// Characters scanned after a "sold" label for a price or date.
    pub sale_label_window: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            min_plausible_amount: 10_000,
            valuation_window: 80,
            sale_label_window: 60,
        }
    }
}

/// Record extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Record pages fetched concurrently per list page.
    pub concurrency: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// A real estate brand and the web domain its listings live on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyBrand {
    pub name: String,
    pub domain: String,
}

impl AgencyBrand {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

/// Agent attribution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Closed brand list; each brand contributes one scoped query.
    pub brands: Vec<AgencyBrand>,

    /// General listing aggregators queried after the brands.
    pub portal_domains: Vec<String>,

    /// Hosts never treated as evidence.
    pub blocked_hosts: Vec<String>,

    pub max_queries_per_address: usize,

    /// Candidate links fetched per query.
    pub max_candidates_per_query: usize,

    /// Price tolerance, percent of the recorded sale price.
    pub price_tolerance_pct: f64,

    pub date_tolerance_days: i64,

    /// Candidate names kept per page.
    pub max_agent_names: usize,

    /// Names stored on an attributed record.
    pub stored_agent_names: usize,

    /// Records attributed concurrently.
    pub concurrency: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            brands: vec![
                AgencyBrand::new("Ray White", "raywhite.co.nz"),
                AgencyBrand::new("Harcourts", "harcourts.co.nz"),
                AgencyBrand::new("Barfoot & Thompson", "barfoot.co.nz"),
                AgencyBrand::new("Bayleys", "bayleys.co.nz"),
                AgencyBrand::new("LJ Hooker", "ljhooker.co.nz"),
                AgencyBrand::new("Tall Poppy", "tallpoppy.co.nz"),
                AgencyBrand::new("Professionals", "professionals.co.nz"),
                AgencyBrand::new("Century 21", "century21.co.nz"),
                AgencyBrand::new("Mike Pero", "mikepero.com"),
                AgencyBrand::new("Property Brokers", "propertybrokers.co.nz"),
            ],
            portal_domains: vec![
                "oneroof.co.nz".to_string(),
                "homes.co.nz".to_string(),
                "realestate.co.nz".to_string(),
            ],
            blocked_hosts: vec![
                "facebook.com".to_string(),
                "instagram.com".to_string(),
                "linkedin.com".to_string(),
                "twitter.com".to_string(),
                "x.com".to_string(),
                "youtube.com".to_string(),
                "tiktok.com".to_string(),
                "pinterest.com".to_string(),
            ],
            max_queries_per_address: 6,
            max_candidates_per_query: 3,
            price_tolerance_pct: 1.0,
            date_tolerance_days: 7,
            max_agent_names: 6,
            stored_agent_names: 3,
            concurrency: 3,
        }
    }
}

impl AttributionConfig {
    /// Every host a candidate link may come from.
    pub fn allowed_domains(&self) -> impl Iterator<Item = &str> {
        self.brands
            .iter()
            .map(|b| b.domain.as_str())
            .chain(self.portal_domains.iter().map(String::as_str))
    }
}

/// Inbound parameters of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub suburb: String,

    /// Broader district containing the suburb.
    #[serde(default)]
    pub district: Option<String>,

    #[serde(default)]
    pub adjacent_suburbs: Vec<String>,

    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_window_months")]
    pub window_months: u32,

    /// Record-volume target that ends discovery early.
    #[serde(default = "default_min_records")]
    pub min_records: usize,

    #[serde(default = "default_min_agents_for_ranking")]
    pub min_agents_for_ranking: usize,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Rows needing agent data; defaults to `min_records`.
    #[serde(default)]
    pub agent_rows: Option<usize>,

    #[serde(default)]
    pub debug: bool,
}

fn default_region() -> String {
    "auckland".to_string()
}

fn default_rows_per_page() -> usize {
    50
}

fn default_max_pages() -> usize {
    2
}

fn default_window_months() -> u32 {
    12
}

fn default_min_records() -> usize {
    30
}

fn default_min_agents_for_ranking() -> usize {
    2
}

fn default_max_sources() -> usize {
    6
}

impl RunRequest {
    /// Request for a suburb with every other parameter defaulted.
    pub fn for_suburb(region: impl Into<String>, suburb: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            suburb: suburb.into(),
            district: None,
            adjacent_suburbs: Vec::new(),
            rows_per_page: default_rows_per_page(),
            max_pages: default_max_pages(),
            window_months: default_window_months(),
            min_records: default_min_records(),
            min_agents_for_ranking: default_min_agents_for_ranking(),
            max_sources: default_max_sources(),
            agent_rows: None,
            debug: false,
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn with_adjacent(mut self, suburbs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.adjacent_suburbs = suburbs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_records(mut self, min_records: usize) -> Self {
        self.min_records = min_records;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn with_min_agents(mut self, min_agents: usize) -> Self {
        self.min_agents_for_ranking = min_agents;
        self
    }

    pub fn with_agent_rows(mut self, rows: usize) -> Self {
        self.agent_rows = Some(rows);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// How many leading records get agent attribution.
    pub fn agent_rows(&self) -> usize {
        self.agent_rows.unwrap_or(self.min_records)
    }

    /// Trim names; a blank region falls back to the default.
    pub fn normalized(mut self) -> Self {
        self.region = self.region.trim().to_string();
        if self.region.is_empty() {
            self.region = default_region();
        }
        self.suburb = self.suburb.trim().to_string();
        self.district = self
            .district
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.adjacent_suburbs = self
            .adjacent_suburbs
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: RunRequest = serde_json::from_str(r#"{"suburb":"Ponsonby"}"#).unwrap();
        assert_eq!(request.region, "auckland");
        assert_eq!(request.rows_per_page, 50);
        assert_eq!(request.max_pages, 2);
        assert_eq!(request.window_months, 12);
        assert_eq!(request.min_agents_for_ranking, 2);
        assert_eq!(request.agent_rows(), 30);
        assert!(!request.debug);
    }

    #[test]
    fn test_request_camel_case_fields() {
        let request: RunRequest = serde_json::from_str(
            r#"{"suburb":"Ponsonby","adjacentSuburbs":["Grey Lynn"],"agentRows":5,"maxSources":3}"#,
        )
        .unwrap();
        assert_eq!(request.adjacent_suburbs, vec!["Grey Lynn".to_string()]);
        assert_eq!(request.agent_rows(), 5);
        assert_eq!(request.max_sources, 3);
    }

    #[test]
    fn test_site_helpers() {
        let site = SiteConfig::default();
        assert_eq!(site.bare_host(), "trademe.co.nz");
        assert_eq!(
            site.record_url("abc-123"),
            "https://www.trademe.co.nz/a/property/insights/profile/abc-123"
        );
    }

    #[test]
    fn test_default_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.parse.min_plausible_amount, 10_000);
        assert_eq!(config.attribution.price_tolerance_pct, 1.0);
        assert_eq!(config.attribution.date_tolerance_days, 7);
        assert_eq!(config.attribution.max_agent_names, 6);
        assert!(config
            .attribution
            .allowed_domains()
            .any(|d| d == "oneroof.co.nz"));
    }

    #[test]
    fn test_config_round_trips_durations() {
        let config = PipelineConfig::new().with_rendering(false);
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.fetch.rendering_enabled);
        assert_eq!(back.fetch.settle_delay, Duration::from_millis(750));
        assert_eq!(back.fetch.navigation_timeout, Duration::from_secs(60));
    }
}
