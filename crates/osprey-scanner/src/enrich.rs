//! Secondary profile details for discovered accounts.
//!
//! Enrichment never fails. Whatever goes wrong, the caller gets a
//! [`ProfileRecord`] with `site` and `url` filled in and the rest empty.

use async_trait::async_trait;
use osprey_collectors::{HttpPageFetcher, PageFetcher};
use osprey_core::{AppConfig, ProfileRecord};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Looks up profile details for an account URL.
#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    /// Enrich the account at `url` on `site`.
    async fn enrich(&self, url: &str, site: &str) -> ProfileRecord;
}

/// Returns bare records without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

#[async_trait]
impl ProfileEnricher for NoopEnricher {
    async fn enrich(&self, url: &str, site: &str) -> ProfileRecord {
        ProfileRecord::new(site, url)
    }
}

/// Sites with a known enrichment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// github.com profile pages
    GitHub,
    /// twitter.com / x.com
    Twitter,
}

impl ProfileSource {
    /// Recognise the site from a profile URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        match host {
            "github.com" => Some(Self::GitHub),
            "twitter.com" | "mobile.twitter.com" | "x.com" => Some(Self::Twitter),
            _ => None,
        }
    }
}

/// Enricher that fetches the profile page and scrapes it.
#[derive(Debug, Clone)]
pub struct HttpProfileEnricher<F = HttpPageFetcher> {
    fetcher: F,
}

impl<F: PageFetcher> HttpProfileEnricher<F> {
    /// Create an enricher over `fetcher`.
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl HttpProfileEnricher<HttpPageFetcher> {
    /// Create an enricher using the configured user agent and enrichment timeout.
    pub fn from_config(config: &AppConfig) -> osprey_collectors::Result<Self> {
        let fetcher = HttpPageFetcher::new(
            &config.scanning.user_agent,
            Duration::from_secs(config.enrichment.timeout_secs),
        )?;
        Ok(Self::new(fetcher))
    }
}

#[async_trait]
impl<F: PageFetcher> ProfileEnricher for HttpProfileEnricher<F> {
    async fn enrich(&self, url: &str, site: &str) -> ProfileRecord {
        let mut record = ProfileRecord::new(site, url);

        let Some(source) = ProfileSource::from_url(url) else {
            debug!(site, url, "no enrichment strategy for site");
            return record;
        };

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(site, url, error = %e, "profile enrichment failed");
                return record;
            }
        };

        match source {
            ProfileSource::GitHub => parse_github_profile(&html, &mut record),
            ProfileSource::Twitter => parse_open_graph(&html, &mut record),
        }
        debug!(site, url, enriched = record.has_details(), "enriched profile");
        record
    }
}

fn first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn attr_of(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fill `record` from a GitHub profile page.
pub fn parse_github_profile(html: &str, record: &mut ProfileRecord) {
    let document = Html::parse_document(html);

    record.avatar_url = first(&document, r#"img[alt="Avatar"]"#)
        .or_else(|| first(&document, "img.avatar-user"))
        .and_then(|img| attr_of(img, "src"));
    record.bio = first(&document, "div[data-bio-text]")
        .or_else(|| first(&document, "div.user-profile-bio"))
        .and_then(text_of);
    record.followers = first(&document, r#"a[href$="?tab=followers"] span.text-bold"#)
        .and_then(text_of);
    record.following = first(&document, r#"a[href$="?tab=following"] span.text-bold"#)
        .and_then(text_of);
}

/// Fill `record` from Open Graph tags, the only part of a script-rendered
/// page that is present in the initial HTML.
pub fn parse_open_graph(html: &str, record: &mut ProfileRecord) {
    let document = Html::parse_document(html);

    record.bio = first(&document, r#"meta[property="og:description"]"#)
        .and_then(|meta| attr_of(meta, "content"));
    record.avatar_url = first(&document, r#"meta[property="og:image"]"#)
        .and_then(|meta| attr_of(meta, "content"));
}
