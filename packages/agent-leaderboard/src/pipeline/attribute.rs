//! Agent attribution.
//!
//! For each record: search brand sites and then listing portals for the
//! quoted street address, fetch a few admissible candidate pages, and
//! accept the first page whose evidence satisfies a confidence tier.
//!
//! Tiers are data ([`TIERS`]), evaluated in order:
//!
//! | tier | requires all of                          | and any of                 |
//! |------|------------------------------------------|----------------------------|
//! | A    | agency, agent name, price match, date match | -                       |
//! | B    | agency, agent name                       | price, date, sold marker   |

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchResult, PipelineError, PipelineResult};
use crate::parsers::{contains_phrase, find_amounts, find_dates, normalize_text};
use crate::traits::fetcher::PageFetcher;
use crate::traits::searcher::WebSearcher;
use crate::types::config::{AttributionConfig, ParseConfig};
use crate::types::record::SaleRecord;
use crate::types::run::{DropReason, PipelineRun};

static RE_SOLD_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bsold\b").unwrap());

// A name is two capitalized words, each optionally hyphenated or with an
// apostrophe ("Mary-Jane O'Neil").
const NAME: &str = r"[A-Z][a-z]+(?:['-][A-Z]?[a-z]+)?\s+[A-Z][a-z]+(?:['-][A-Z]?[a-z]+)?";

static RE_LABELLED_AGENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:\b[Aa]gents?|\b[Bb]y):?\s+({NAME}(?:\s*(?:,|&|\band\b)\s*{NAME})*)"
    ))
    .unwrap()
});
static RE_NAME_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:,|&|\band\b)\s*").unwrap());

/// Capitalized words that are never half of a person's name.
const NAME_STOPWORDS: &[&str] = &[
    // calendar
    "jan", "january", "feb", "february", "mar", "march", "apr", "april", "may", "jun", "june",
    "jul", "july", "aug", "august", "sep", "sept", "september", "oct", "october", "nov",
    "november", "dec", "december", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
    // street types
    "st", "street", "rd", "road", "ave", "avenue", "lane", "ln", "pl", "place", "dr", "drive",
    "cres", "crescent", "tce", "terrace", "way", "close", "court", "ct", "grove", "parade",
    "highway", "hwy", "quay", "rise", "view",
    // listing vocabulary
    "sold", "sale", "sales", "price", "capital", "value", "rateable", "land", "floor", "area",
    "bedroom", "bedrooms", "bathroom", "bathrooms", "open", "home", "homes", "house",
    "property", "properties", "real", "estate", "contact", "read", "more", "call", "email",
    "phone", "agent", "agents", "listing", "listed", "auction", "tender", "deadline", "photo",
    "photos", "gallery", "search", "menu", "login", "sign", "register", "privacy", "policy",
    "terms", "new", "zealand", "the", "this", "our", "about", "team", "office", "branch", "buy",
    "rent", "residential", "commercial", "rural", "lifestyle", "section", "townhouse",
    "apartment", "unit", "updated", "date", "recent", "market", "appraisal", "free", "find",
    "get", "book", "share", "save", "print", "next", "previous", "back", "by", "for",
    "details", "features", "licensed", "rea", "ltd", "limited", "group", "realty",
];

/// Evidence a candidate page can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Agency,
    AgentName,
    PriceMatch,
    DateMatch,
    SoldMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    /// Every dimension corroborated
    A,
    /// Identity plus at least one corroborating dimension
    B,
}

/// One named predicate set.
#[derive(Debug, Clone, Copy)]
pub struct TierRule {
    pub tier: ConfidenceTier,
    pub all_of: &'static [Signal],
    pub any_of: &'static [Signal],
}

impl TierRule {
    pub fn satisfied_by(&self, evidence: &CandidateEvidence) -> bool {
        self.all_of.iter().all(|s| evidence.has(*s))
            && (self.any_of.is_empty() || self.any_of.iter().any(|s| evidence.has(*s)))
    }
}

/// Tiers in priority order.
pub const TIERS: [TierRule; 2] = [
    TierRule {
        tier: ConfidenceTier::A,
        all_of: &[
            Signal::Agency,
            Signal::AgentName,
            Signal::PriceMatch,
            Signal::DateMatch,
        ],
        any_of: &[],
    },
    TierRule {
        tier: ConfidenceTier::B,
        all_of: &[Signal::Agency, Signal::AgentName],
        any_of: &[Signal::PriceMatch, Signal::DateMatch, Signal::SoldMarker],
    },
];

/// First tier the evidence satisfies.
pub fn classify(evidence: &CandidateEvidence) -> Option<ConfidenceTier> {
    TIERS
        .iter()
        .find(|rule| rule.satisfied_by(evidence))
        .map(|rule| rule.tier)
}

/// What one candidate page says about a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateEvidence {
    pub agency: Option<String>,
    pub agents: Vec<String>,
    pub price_match: bool,
    pub date_match: bool,
    pub sold_marker: bool,
}

impl CandidateEvidence {
    pub fn has(&self, signal: Signal) -> bool {
        match signal {
            Signal::Agency => self.agency.is_some(),
            Signal::AgentName => !self.agents.is_empty(),
            Signal::PriceMatch => self.price_match,
            Signal::DateMatch => self.date_match,
            Signal::SoldMarker => self.sold_marker,
        }
    }
}

/// Street line of an address: everything before the first comma.
pub fn street_line(address: &str) -> &str {
    address.split(',').next().unwrap_or(address).trim()
}

/// Brand-scoped queries, then portal-scoped ones, capped.
pub fn build_queries(street: &str, config: &AttributionConfig) -> Vec<String> {
    let brand_queries = config
        .brands
        .iter()
        .map(|b| format!("site:{} \"{}\"", b.domain, street));
    let portal_queries = config
        .portal_domains
        .iter()
        .map(|p| format!("site:{} \"{}\" sold", p, street));

    brand_queries
        .chain(portal_queries)
        .take(config.max_queries_per_address)
        .collect()
}

fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches("www.");
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Whether a search result may be used as evidence.
pub fn admissible_host(url: &Url, config: &AttributionConfig) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    if config.blocked_hosts.iter().any(|b| host_matches(&host, b)) {
        return false;
    }
    config.allowed_domains().any(|d| host_matches(&host, d))
}

/// Reads agency, agent names and corroborating facts off page text.
pub struct EvidenceReader {
    agency_pattern: Regex,
    brands: Vec<String>,
    brand_words: HashSet<String>,
    max_names: usize,
    price_tolerance_pct: f64,
    date_tolerance_days: i64,
    min_amount: u64,
}

impl EvidenceReader {
    pub fn new(config: &AttributionConfig, parse: &ParseConfig) -> PipelineResult<Self> {
        if config.brands.is_empty() {
            return Err(PipelineError::Config("attribution needs at least one agency brand".into()));
        }
        let alternatives: Vec<String> = config
            .brands
            .iter()
            .map(|b| regex::escape(&b.name).replace(' ', r"\s+"))
            .collect();
        let agency_pattern = Regex::new(&format!(
            r"(?i)\b({})\b(?:\s*\(([^()]{{1,40}})\))?",
            alternatives.join("|")
        ))
        .map_err(|e| PipelineError::Config(format!("agency pattern: {e}")))?;

        let brand_words = config
            .brands
            .iter()
            .flat_map(|b| b.name.split_whitespace())
            .map(str::to_lowercase)
            .collect();

        Ok(Self {
            agency_pattern,
            brands: config.brands.iter().map(|b| b.name.clone()).collect(),
            brand_words,
            max_names: config.max_agent_names,
            price_tolerance_pct: config.price_tolerance_pct,
            date_tolerance_days: config.date_tolerance_days,
            min_amount: parse.min_plausible_amount,
        })
    }

    /// Canonical brand name, with the branch when the page gives one.
    pub fn agency(&self, text: &str) -> Option<String> {
        let caps = self.agency_pattern.captures(text)?;
        let matched = caps.get(1)?.as_str();
        let matched = matched.split_whitespace().collect::<Vec<_>>().join(" ");
        let brand = self
            .brands
            .iter()
            .find(|b| b.eq_ignore_ascii_case(&matched))?
            .clone();
        Some(match caps.get(2) {
            Some(branch) => format!("{} ({})", brand, branch.as_str().trim()),
            None => brand,
        })
    }

    /// Labelled names first, then two-capitalized-word candidates, capped.
    ///
    /// Words from `exclude` (the record address) never form a name.
    pub fn agent_names(&self, text: &str, exclude: &str) -> Vec<String> {
        let excluded: HashSet<String> = exclude
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let usable = |word: &str| {
            let lower = word.to_lowercase();
            !NAME_STOPWORDS.contains(&lower.as_str())
                && !self.brand_words.contains(&lower)
                && !excluded.contains(&lower)
        };

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let mut push = |name: String| {
            if names.len() < self.max_names && seen.insert(name.to_lowercase()) {
                names.push(name);
            }
        };

        for caps in RE_LABELLED_AGENTS.captures_iter(text) {
            let Some(list) = caps.get(1) else { continue };
            for name in RE_NAME_SEPARATOR.split(list.as_str()) {
                let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
                if name.split(' ').all(&usable) {
                    push(name);
                }
            }
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut i = 0;
        while i + 1 < tokens.len() {
            let first = tokens[i];
            let second = tokens[i + 1].trim_end_matches(|c: char| ",.;:!?)".contains(c));
            if is_capitalized(first) && is_capitalized(second) && usable(first) && usable(second) {
                push(format!("{first} {second}"));
                i += 2;
            } else {
                i += 1;
            }
        }

        names
    }

    /// All evidence for `record` in normalized page `text`.
    pub fn read(&self, text: &str, record: &SaleRecord) -> CandidateEvidence {
        let price = record.sold_price as f64;
        let price_match = find_amounts(text, self.min_amount)
            .into_iter()
            .any(|a| ((a as f64 - price).abs() / price * 100.0) <= self.price_tolerance_pct);

        let date_match = record.sold_date.is_some_and(|sold| {
            find_dates(text)
                .into_iter()
                .any(|d| (d - sold).num_days().abs() <= self.date_tolerance_days)
        });

        CandidateEvidence {
            agency: self.agency(text),
            agents: self.agent_names(text, &record.address),
            price_match,
            date_match,
            sold_marker: RE_SOLD_MARKER.is_match(text),
        }
    }
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    !rest.is_empty()
        && rest[0].is_ascii_lowercase()
        && rest
            .iter()
            .all(|c| c.is_ascii_lowercase() || *c == '-' || *c == '\'')
}

/// A winning candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub tier: ConfidenceTier,
    pub agency: String,
    pub agents: Vec<String>,
    pub source_url: String,
}

/// Outcome for one record, with its log lines.
#[derive(Debug, Clone, Default)]
pub struct AttributionAttempt {
    pub attribution: Option<Attribution>,
    pub log: Vec<String>,
}

/// Links sale records to agents through search and page evidence.
pub struct Attributor {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    reader: EvidenceReader,
    config: AttributionConfig,
}

impl Attributor {
    /// `fetcher` retrieves candidate pages; agency sites render server-side,
    /// so the direct strategy is normally enough.
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        config: &AttributionConfig,
        parse: &ParseConfig,
    ) -> PipelineResult<Self> {
        Ok(Self {
            searcher,
            fetcher,
            reader: EvidenceReader::new(config, parse)?,
            config: config.clone(),
        })
    }

    /// Try every query for one record until a candidate satisfies a tier.
    ///
    /// Only a fatal fetch error is returned as `Err`.
    pub async fn attribute_record(&self, record: &SaleRecord) -> FetchResult<AttributionAttempt> {
        let street = street_line(&record.address);
        let mut log = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();

        for query in build_queries(street, &self.config) {
            let hits = match self.searcher.search(&query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed; treating as no results");
                    log.push(format!("{street}: search failed for {query}: {e}"));
                    continue;
                }
            };

            let candidates: Vec<Url> = hits
                .into_iter()
                .map(|h| h.url)
                .filter(|u| admissible_host(u, &self.config))
                .filter(|u| tried.insert(u.to_string()))
                .take(self.config.max_candidates_per_query)
                .collect();
            log.push(format!("{street}: {query} -> {} candidates", candidates.len()));

            for url in candidates {
                let page = match self.fetcher.fetch(url.as_str()).await {
                    Ok(page) => page,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        debug!(url = %url, error = %e, "Candidate fetch failed");
                        log.push(format!("{street}: fetch failed {url}: {e}"));
                        continue;
                    }
                };

                let text = normalize_text(&page.html);
                if !contains_phrase(&text, street) {
                    log.push(format!("{street}: address not on {url}"));
                    continue;
                }

                let evidence = self.reader.read(&text, record);
                match (classify(&evidence), evidence.agency.clone()) {
                    (Some(tier), Some(agency)) => {
                        log.push(format!(
                            "{street}: tier {tier:?} via {url} ({agency}; {})",
                            evidence.agents.join(", ")
                        ));
                        return Ok(AttributionAttempt {
                            attribution: Some(Attribution {
                                tier,
                                agency,
                                agents: evidence.agents,
                                source_url: url.to_string(),
                            }),
                            log,
                        });
                    }
                    _ => log.push(format!(
                        "{street}: no tier on {url} (agency={}, names={}, price={}, date={}, sold={})",
                        evidence.agency.is_some(),
                        evidence.agents.len(),
                        evidence.price_match,
                        evidence.date_match,
                        evidence.sold_marker
                    )),
                }
            }
        }

        log.push(format!("{street}: agent not found"));
        Ok(AttributionAttempt {
            attribution: None,
            log,
        })
    }

    /// Attribute the first `limit` records, concurrently but applied in
    /// record order. Returns how many were attributed.
    pub async fn attribute_all(
        &self,
        records: &mut [SaleRecord],
        limit: usize,
        run: &mut PipelineRun,
    ) -> FetchResult<usize> {
        let limit = limit.min(records.len());
        let attempts: Vec<FetchResult<AttributionAttempt>> = stream::iter(
            records[..limit].iter().map(|r| self.attribute_record(r)),
        )
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;

        let mut attributed = 0;
        for (record, attempt) in records[..limit].iter_mut().zip(attempts) {
            let attempt = attempt?;
            run.attribution_log.extend(attempt.log);
            match attempt.attribution {
                Some(found) => {
                    record.attribute(
                        &found.agents,
                        &found.agency,
                        &found.source_url,
                        self.config.stored_agent_names,
                    );
                    attributed += 1;
                }
                None => run.count_drop(DropReason::AgentNotFound),
            }
        }

        info!(attempted = limit, attributed = attributed, "Agent attribution complete");
        Ok(attributed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, MockWebSearcher};
    use crate::types::config::RunRequest;
    use crate::types::record::SourceKind;
    use chrono::NaiveDate;

    fn reader() -> EvidenceReader {
        EvidenceReader::new(&AttributionConfig::default(), &ParseConfig::default()).unwrap()
    }

    fn record() -> SaleRecord {
        SaleRecord::new(
            "12 Smith Street, Ponsonby",
            1_200_000,
            1_000_000,
            "https://www.trademe.co.nz/a/property/insights/profile/abc",
            SourceKind::TradeMe,
        )
        .unwrap()
        .with_sold_date(NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(), "15 Oct 2025")
    }

    #[test]
    fn test_queries_brands_then_portals_capped() {
        let config = AttributionConfig::default();
        let queries = build_queries("12 Smith Street", &config);
        assert_eq!(queries.len(), 6);
        assert_eq!(queries[0], r#"site:raywhite.co.nz "12 Smith Street""#);

        let short = AttributionConfig {
            brands: config.brands[..1].to_vec(),
            ..config
        };
        let queries = build_queries("12 Smith Street", &short);
        assert_eq!(queries[1], r#"site:oneroof.co.nz "12 Smith Street" sold"#);
        assert_eq!(queries.len(), 4);
    }

    #[test]
    fn test_admissible_hosts() {
        let config = AttributionConfig::default();
        let ok = |u: &str| admissible_host(&Url::parse(u).unwrap(), &config);
        assert!(ok("https://www.raywhite.co.nz/listing/1"));
        assert!(ok("https://ponsonby.raywhite.co.nz/listing/1"));
        assert!(ok("https://www.oneroof.co.nz/property/x"));
        assert!(!ok("https://www.facebook.com/raywhite"));
        assert!(!ok("https://notraywhite.co.nz/x"));
        assert!(!ok("https://example.com/x"));
    }

    #[test]
    fn test_agency_with_branch() {
        let reader = reader();
        assert_eq!(
            reader.agency("Marketed by Ray White (Ponsonby) for the vendor").as_deref(),
            Some("Ray White (Ponsonby)")
        );
        assert_eq!(reader.agency("barfoot & thompson sold it").as_deref(), Some("Barfoot & Thompson"));
        assert_eq!(reader.agency("no brand here"), None);
    }

    #[test]
    fn test_agent_names_labelled_first_and_capped() {
        let reader = reader();
        let text = "Contact Sam Lee today. Agents: Jane Doe & John Smith Ray White Ponsonby";
        let names = reader.agent_names(text, "12 Smith Street, Ponsonby");
        assert_eq!(names[0], "Jane Doe");
        // "Smith" is part of the address, so the labelled "John Smith" is dropped
        assert!(!names.contains(&"John Smith".to_string()));
        assert!(names.contains(&"Sam Lee".to_string()));
    }

    #[test]
    fn test_agent_names_skip_stopwords() {
        let reader = reader();
        let names = reader.agent_names("Sold 15 Oct 2025 Capital Value Open Home Real Estate", "");
        assert!(names.is_empty());
    }

    #[test]
    fn test_tier_policy() {
        let full = CandidateEvidence {
            agency: Some("Ray White".into()),
            agents: vec!["Jane Doe".into()],
            price_match: true,
            date_match: true,
            sold_marker: true,
        };
        assert_eq!(classify(&full), Some(ConfidenceTier::A));

        let marker_only = CandidateEvidence {
            price_match: false,
            date_match: false,
            ..full.clone()
        };
        assert_eq!(classify(&marker_only), Some(ConfidenceTier::B));

        let nothing_corroborated = CandidateEvidence {
            sold_marker: false,
            ..marker_only.clone()
        };
        assert_eq!(classify(&nothing_corroborated), None);

        let no_agency = CandidateEvidence {
            agency: None,
            ..full.clone()
        };
        assert_eq!(classify(&no_agency), None);

        let no_names = CandidateEvidence {
            agents: Vec::new(),
            ..full
        };
        assert_eq!(classify(&no_names), None);
    }

    #[test]
    fn test_evidence_tolerances() {
        let reader = reader();
        let record = record();

        let near = reader.read("Ray White Jane Doe $1,210,000 on 20 Oct 2025", &record);
        assert!(near.price_match);
        assert!(near.date_match);

        let far = reader.read("Ray White Jane Doe $1,250,000 on 30 Oct 2025", &record);
        assert!(!far.price_match);
        assert!(!far.date_match);
    }

    #[tokio::test]
    async fn test_attribute_record_first_satisfying_candidate_wins() {
        let query = r#"site:raywhite.co.nz "12 Smith Street""#;
        let searcher = MockWebSearcher::new().with_urls(
            query,
            &[
                "https://www.facebook.com/post/1",
                "https://www.raywhite.co.nz/other",
                "https://www.raywhite.co.nz/sold/12-smith",
            ],
        );
        let fetcher = MockFetcher::direct()
            .with_page("https://www.raywhite.co.nz/other", "<p>14 Smith Street sold by Ray White</p>")
            .with_page(
                "https://www.raywhite.co.nz/sold/12-smith",
                "<h2>12 Smith Street</h2><p>Sold for $1,200,000 on 15 Oct 2025</p>\
                 <p>Agents: Jane Doe</p><footer>Ray White (Ponsonby)</footer>",
            );
        let attributor = Attributor::new(
            Arc::new(searcher),
            Arc::new(fetcher),
            &AttributionConfig::default(),
            &ParseConfig::default(),
        )
        .unwrap();

        let attempt = attributor.attribute_record(&record()).await.unwrap();
        let found = attempt.attribution.unwrap();
        assert_eq!(found.tier, ConfidenceTier::A);
        assert_eq!(found.agency, "Ray White (Ponsonby)");
        assert_eq!(found.agents, vec!["Jane Doe".to_string()]);
        assert_eq!(found.source_url, "https://www.raywhite.co.nz/sold/12-smith");
    }

    #[tokio::test]
    async fn test_attribute_all_counts_not_found() {
        let attributor = Attributor::new(
            Arc::new(MockWebSearcher::new()),
            Arc::new(MockFetcher::direct()),
            &AttributionConfig::default(),
            &ParseConfig::default(),
        )
        .unwrap();
        let mut run = PipelineRun::new(RunRequest::for_suburb("auckland", "ponsonby"));
        let mut records = vec![record()];

        let attributed = attributor.attribute_all(&mut records, 5, &mut run).await.unwrap();
        assert_eq!(attributed, 0);
        assert_eq!(run.drop_count(DropReason::AgentNotFound), 1);
        assert!(!records[0].is_attributed());
        assert!(run.attribution_log.last().unwrap().contains("agent not found"));
    }
}
