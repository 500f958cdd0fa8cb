//! Account-existence probing over HTTP.
//!
//! Every site is checked independently. Checks run concurrently up to
//! `scanning.concurrent_probes` but are yielded in definition order, so the
//! scanner's progress counter follows the site list.

use crate::collector::{AccountEnumerator, AccountStatus, SiteCheck, SiteChecks};
use crate::error::{CollectorError, Result};
use crate::http::client_from_config;
use crate::sites::{DetectionMethod, SiteDefinition, SiteLoader};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use osprey_core::ScanningConfig;
use regex::Regex;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
struct CompiledSite {
    definition: SiteDefinition,
    regex: Option<Regex>,
}

/// [`AccountEnumerator`] that requests each site's profile URL.
#[derive(Debug, Clone)]
pub struct HttpAccountProber {
    client: Client,
    sites: Arc<Vec<CompiledSite>>,
    concurrency: usize,
}

impl HttpAccountProber {
    /// Create a prober for the given sites.
    ///
    /// # Errors
    /// Returns error if a definition is invalid or the HTTP client cannot be built.
    pub fn new(sites: Vec<SiteDefinition>, config: &ScanningConfig) -> Result<Self> {
        Self::with_client(sites, client_from_config(config)?, config.concurrent_probes)
    }

    /// Create a prober with the configured site list (or the built-in one).
    pub fn from_config(config: &ScanningConfig) -> Result<Self> {
        let sites = SiteLoader::load(config.sites_file.as_deref())?;
        Self::new(sites, config)
    }

    /// Create a prober using an existing client.
    pub fn with_client(
        sites: Vec<SiteDefinition>,
        client: Client,
        concurrency: usize,
    ) -> Result<Self> {
        if sites.is_empty() {
            return Err(CollectorError::Definitions(
                "no site definitions to probe".to_string(),
            ));
        }

        let sites = sites
            .into_iter()
            .map(|definition| {
                definition.validate()?;
                let regex = definition.compiled_regex()?;
                Ok(CompiledSite { definition, regex })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client,
            sites: Arc::new(sites),
            concurrency: concurrency.max(1),
        })
    }

    /// Number of sites checked per enumeration.
    #[must_use]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Site definitions in probe order.
    pub fn sites(&self) -> impl Iterator<Item = &SiteDefinition> {
        self.sites.iter().map(|s| &s.definition)
    }
}

#[async_trait]
impl AccountEnumerator for HttpAccountProber {
    async fn enumerate(&self, username: &str) -> Result<SiteChecks> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CollectorError::invalid_target(username, "empty username"));
        }

        let total = self.sites.len();
        info!(username, total, "enumerating accounts");

        let client = self.client.clone();
        let sites = Arc::clone(&self.sites);
        let username = username.to_string();

        let checks = stream::iter(0..total)
            .map(move |index| {
                let client = client.clone();
                let sites = Arc::clone(&sites);
                let username = username.clone();
                async move { probe(&client, &sites[index], &username).await }
            })
            .buffered(self.concurrency)
            .boxed();

        Ok(SiteChecks { total, checks })
    }

    fn name(&self) -> &str {
        "http-account-prober"
    }
}

async fn probe(client: &Client, site: &CompiledSite, username: &str) -> SiteCheck {
    let definition = &site.definition;
    let url = definition.profile_url(username);

    if let Some(regex) = &site.regex {
        if !regex.is_match(username) {
            debug!(site = %definition.name, username, "username rejected by regex_check");
            return SiteCheck {
                site: definition.name.clone(),
                url,
                status: AccountStatus::Illegal,
            };
        }
    }

    let probe_url = definition.probe_url(username);
    let status = match request(client, definition, &probe_url).await {
        Ok(status) => status,
        Err(e) => {
            debug!(site = %definition.name, error = %e, "probe failed");
            AccountStatus::Unknown
        }
    };

    debug!(site = %definition.name, %status, "probed site");
    SiteCheck {
        site: definition.name.clone(),
        url,
        status,
    }
}

async fn request(
    client: &Client,
    definition: &SiteDefinition,
    probe_url: &str,
) -> Result<AccountStatus> {
    let response = client.get(probe_url).send().await?;
    let status = response.status().as_u16();
    let landed_on_probe_url = response.url().as_str() == probe_url;

    let body = if definition.error_type == DetectionMethod::Message {
        Some(response.text().await?)
    } else {
        None
    };

    Ok(classify(definition, status, landed_on_probe_url, body.as_deref()))
}

/// Decide an account's status from a probe response.
pub(crate) fn classify(
    definition: &SiteDefinition,
    status: u16,
    landed_on_probe_url: bool,
    body: Option<&str>,
) -> AccountStatus {
    if status == 429 {
        return AccountStatus::Unknown;
    }
    if status == 403 && body.is_some_and(|b| b.contains("cf-chl") || b.contains("captcha")) {
        return AccountStatus::Waf;
    }

    let success = (200..300).contains(&status);
    match definition.error_type {
        DetectionMethod::StatusCode => {
            if success {
                AccountStatus::Claimed
            } else {
                AccountStatus::Available
            }
        }
        DetectionMethod::Message => {
            let body = body.unwrap_or_default();
            if definition
                .error_message
                .iter()
                .any(|marker| body.contains(marker.as_str()))
            {
                AccountStatus::Available
            } else if success {
                AccountStatus::Claimed
            } else {
                AccountStatus::Unknown
            }
        }
        DetectionMethod::ResponseUrl => {
            if success && landed_on_probe_url {
                AccountStatus::Claimed
            } else {
                AccountStatus::Available
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(error_type: DetectionMethod, error_message: &[&str]) -> SiteDefinition {
        SiteDefinition {
            name: "Example".to_string(),
            url: "https://example.com/{}".to_string(),
            probe_url: None,
            error_type,
            error_message: error_message.iter().map(ToString::to_string).collect(),
            regex_check: Some("^[a-z]+$".to_string()),
        }
    }

    #[test]
    fn test_classify_status_code() {
        let def = site(DetectionMethod::StatusCode, &[]);
        assert_eq!(classify(&def, 200, true, None), AccountStatus::Claimed);
        assert_eq!(classify(&def, 404, true, None), AccountStatus::Available);
        assert_eq!(classify(&def, 429, true, None), AccountStatus::Unknown);
    }

    #[test]
    fn test_classify_message() {
        let def = site(DetectionMethod::Message, &["No such user."]);
        assert_eq!(
            classify(&def, 200, true, Some("<p>No such user.</p>")),
            AccountStatus::Available
        );
        assert_eq!(
            classify(&def, 200, true, Some("<p>karma: 12</p>")),
            AccountStatus::Claimed
        );
        assert_eq!(
            classify(&def, 500, true, Some("oops")),
            AccountStatus::Unknown
        );
        assert_eq!(
            classify(&def, 403, true, Some("<div id=\"cf-chl-widget\">")),
            AccountStatus::Waf
        );
    }

    #[test]
    fn test_classify_response_url() {
        let def = site(DetectionMethod::ResponseUrl, &[]);
        assert_eq!(classify(&def, 200, true, None), AccountStatus::Claimed);
        assert_eq!(classify(&def, 200, false, None), AccountStatus::Available);
    }

    #[test]
    fn test_prober_requires_sites() {
        let result = HttpAccountProber::new(Vec::new(), &ScanningConfig::default());
        assert!(matches!(result, Err(CollectorError::Definitions(_))));
    }

    #[tokio::test]
    async fn test_regex_rejected_username_is_illegal_without_request() {
        let prober = HttpAccountProber::new(
            vec![site(DetectionMethod::StatusCode, &[])],
            &ScanningConfig::default(),
        )
        .expect("create prober");

        let mut checks = prober.enumerate("NOT-LOWER").await.expect("enumerate");
        assert_eq!(checks.total, 1);

        let check = checks.checks.next().await.expect("one check");
        assert_eq!(check.status, AccountStatus::Illegal);
        assert_eq!(check.url, "https://example.com/NOT-LOWER");
        assert!(checks.checks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_username_is_rejected() {
        let prober = HttpAccountProber::new(
            vec![site(DetectionMethod::StatusCode, &[])],
            &ScanningConfig::default(),
        )
        .expect("create prober");
        assert!(matches!(
            prober.enumerate("  ").await,
            Err(CollectorError::InvalidTarget { .. })
        ));
    }
}
