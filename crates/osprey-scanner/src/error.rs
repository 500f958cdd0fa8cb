use osprey_collectors::CollectorError;
use osprey_core::{ScanCategory, ValidationError};
use thiserror::Error;

/// Why a scan did not produce a result.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The lookup source failed
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// No lookup strategy exists for the category
    #[error("unsupported scan category: {0}")]
    Unsupported(ScanCategory),

    /// The category is scannable but this worker has no collector for it
    #[error("no collector configured for {0}")]
    NotConfigured(ScanCategory),

    /// The scan was cancelled through its handle
    #[error("scan cancelled")]
    Cancelled,

    /// The worker reported a terminal failure
    #[error("scan failed: {0}")]
    Failed(String),

    /// The enumerator stopped before producing every check it announced
    #[error("enumeration ended after {checked} of {total} checks")]
    Incomplete {
        /// Checks actually produced
        checked: usize,
        /// Checks announced up front
        total: usize,
    },

    /// The enumerator produced more checks than it announced
    #[error("enumerator produced more than the {total} checks it announced")]
    Overrun {
        /// Checks announced up front
        total: usize,
    },

    /// The event stream closed without a terminal event
    #[error("event stream closed before the scan finished")]
    Interrupted,

    /// A collected value could not be stored as a payload
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
