//! Interfaces between the scan worker and external data sources.
//!
//! The scanner depends only on these traits. Implementations are expected to
//! be cheap to share (`Send + Sync`) and to enforce their own timeouts.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of checking one site for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// The account exists
    Claimed,
    /// The site reports no such account
    Available,
    /// The check could not be completed
    Unknown,
    /// The username is not valid on this site
    Illegal,
    /// Blocked by a web application firewall
    Waf,
}

impl AccountStatus {
    /// The single "found" predicate used by the scanner.
    #[must_use]
    pub fn is_found(self) -> bool {
        matches!(self, Self::Claimed)
    }

    /// Human-readable status.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Claimed => "Found",
            Self::Available => "Not Found",
            Self::Unknown => "Unknown",
            Self::Illegal => "Illegal",
            Self::Waf => "Blocked",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of checking one sub-source during account enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCheck {
    /// Site name
    pub site: String,
    /// Profile URL the username would have on this site
    pub url: String,
    /// What the site said
    pub status: AccountStatus,
}

/// Ordered stream of site checks with its length known up front.
pub struct SiteChecks {
    /// Number of checks the stream will yield
    pub total: usize,
    /// One item per site, in definition order
    pub checks: BoxStream<'static, SiteCheck>,
}

impl fmt::Debug for SiteChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteChecks")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// Checks many independent sites for an account with a given username.
#[async_trait]
pub trait AccountEnumerator: Send + Sync {
    /// Start enumerating `username` across every known site.
    ///
    /// Individual site failures are reported as [`AccountStatus::Unknown`]
    /// items; an `Err` means the enumeration could not start at all.
    async fn enumerate(&self, username: &str) -> Result<SiteChecks>;

    /// Identifier used in logs.
    fn name(&self) -> &str;
}

/// Single-shot lookup returning one structured record.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Look up `target` and return its record as a JSON document.
    async fn lookup(&self, target: &str) -> Result<serde_json::Value>;

    /// Identifier used in logs.
    fn name(&self) -> &str;
}

/// Fetches a page body, used by profile enrichment.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_claimed_counts_as_found() {
        assert!(AccountStatus::Claimed.is_found());
        for status in [
            AccountStatus::Available,
            AccountStatus::Unknown,
            AccountStatus::Illegal,
            AccountStatus::Waf,
        ] {
            assert!(!status.is_found(), "{status:?} must not count as found");
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&AccountStatus::Claimed).expect("serialize");
        assert_eq!(json, "\"claimed\"");
        assert_eq!(AccountStatus::Claimed.to_string(), "Found");
    }
}
