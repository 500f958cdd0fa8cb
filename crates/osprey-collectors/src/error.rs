//! Error types for lookup sources.

use thiserror::Error;

/// An external lookup failed.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Connection or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// The source did not answer in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The source asked us to slow down
    #[error("rate limited by {service}")]
    RateLimited {
        /// Which source rate-limited us
        service: String,
    },

    /// The source has no record for the target
    #[error("no record found for {0}")]
    NotFound(String),

    /// The target is not something this source can look up
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget {
        /// Rejected target
        target: String,
        /// Why it was rejected
        reason: String,
    },

    /// The source answered with data we could not interpret
    #[error("malformed response from {service}: {reason}")]
    Malformed {
        /// Which source answered
        service: String,
        /// What was wrong with it
        reason: String,
    },

    /// Site definitions could not be loaded
    #[error("site definitions error: {0}")]
    Definitions(String),

    /// No lookup strategy exists for the request
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl CollectorError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. }
        )
    }

    /// Whether the source asked us to back off.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Build an `InvalidTarget` error.
    pub fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Malformed` error.
    pub fn malformed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed {
                service: err
                    .url()
                    .and_then(|u| u.host_str())
                    .unwrap_or("unknown")
                    .to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CollectorError::invalid_target("10.0.0.1", "private address");
        assert_eq!(
            err.to_string(),
            "invalid target \"10.0.0.1\": private address"
        );

        let err = CollectorError::RateLimited {
            service: "rdap.org".to_string(),
        };
        assert_eq!(err.to_string(), "rate limited by rdap.org");
    }

    #[test]
    fn test_transient_classification() {
        assert!(CollectorError::Network("reset".to_string()).is_transient());
        assert!(CollectorError::Timeout("30s".to_string()).is_transient());
        assert!(CollectorError::RateLimited {
            service: "x".to_string()
        }
        .is_transient());
        assert!(!CollectorError::NotFound("example.com".to_string()).is_transient());
        assert!(!CollectorError::malformed("rdap", "not an object").is_transient());
        assert!(!CollectorError::Unsupported("Profiles".to_string()).is_transient());
    }
}
