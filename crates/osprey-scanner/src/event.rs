//! Events emitted by a running scan.

use osprey_collectors::AccountStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step in the life of a scan.
///
/// For a single scan, `Started` comes first, then any number of `Progress`
/// and `PartialResult` events, then exactly one of `Finished` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// The worker picked up the scan
    Started,
    /// One sub-source has been examined
    Progress {
        /// 1-based index of the sub-source just examined
        current: usize,
        /// Number of sub-sources in this scan
        total: usize,
    },
    /// A sub-source reported a positive hit
    PartialResult {
        /// Sub-source name
        site: String,
        /// Where the hit lives
        url: String,
        /// What the sub-source said
        status: AccountStatus,
    },
    /// The scan completed
    Finished {
        /// Single-shot lookup record; `None` when results arrived as
        /// `PartialResult`s
        record: Option<Value>,
    },
    /// The scan failed; nothing follows
    Failed {
        /// Human-readable failure
        message: String,
    },
}

impl ScanEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Progress { .. } => "progress",
            Self::PartialResult { .. } => "partial_result",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
        }
    }
}
