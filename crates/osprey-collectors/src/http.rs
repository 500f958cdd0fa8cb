//! Shared HTTP plumbing for the collectors.

use crate::collector::PageFetcher;
use crate::error::{CollectorError, Result};
use async_trait::async_trait;
use osprey_core::ScanningConfig;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Build an HTTP client with the configured user agent and timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| CollectorError::Network(format!("failed to create HTTP client: {e}")))
}

/// Build a client from the scanning section of the config.
pub fn client_from_config(config: &ScanningConfig) -> Result<Client> {
    build_client(
        &config.user_agent,
        Duration::from_secs(config.request_timeout_secs),
    )
}

/// Map non-success statuses onto collector errors.
///
/// `what` names the thing being looked up and ends up in `NotFound`.
pub(crate) fn check_status(response: Response, service: &str, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(match status {
        StatusCode::NOT_FOUND => CollectorError::NotFound(what.to_string()),
        StatusCode::TOO_MANY_REQUESTS => CollectorError::RateLimited {
            service: service.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            CollectorError::Timeout(format!("{service} returned HTTP {}", status.as_u16()))
        }
        _ => CollectorError::Network(format!("{service} returned HTTP {}", status.as_u16())),
    })
}

/// [`PageFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Create a fetcher with its own client.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
        })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let host = response.url().host_str().unwrap_or("unknown").to_string();
        let response = check_status(response, &host, url)?;
        Ok(response.text().await?)
    }
}
