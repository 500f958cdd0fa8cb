//! Folding a scan's events into storable records.
//!
//! The pipeline is the usual consumer of a [`ScanHandle`]: it forwards every
//! event to the caller's handlers, enriches each discovered account as it
//! arrives, and returns a [`ScanSummary`] once the scan finishes.

use crate::channel::EventHandler;
use crate::enrich::{NoopEnricher, ProfileEnricher};
use crate::error::{Result, ScanError};
use crate::event::ScanEvent;
use crate::worker::ScanHandle;
use osprey_core::{ProfileRecord, ScanCategory, ScanRecord, TargetName, Timestamp};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything a finished scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Id of the scan invocation
    pub scan_id: Uuid,
    /// Category that was scanned
    pub category: ScanCategory,
    /// Target that was scanned
    pub target: TargetName,
    /// URLs of discovered accounts, in discovery order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Enriched profile of every discovered account
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<ProfileRecord>,
    /// Single-shot lookup record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    /// When the pipeline started consuming
    pub started_at: Timestamp,
    /// When the terminal event arrived
    pub finished_at: Timestamp,
}

impl ScanSummary {
    /// Records to persist for this scan.
    ///
    /// An enumeration yields its URL list under the scanned category and the
    /// enriched profiles under "Profiles", both written even when empty so a
    /// rescan replaces the previous pair together. A single-shot lookup
    /// yields its record under the scanned category.
    pub fn records(&self) -> Result<Vec<ScanRecord>> {
        let mut records = Vec::new();
        if let Some(record) = &self.record {
            records.push(ScanRecord::new(self.category.clone(), record)?);
        } else {
            records.push(ScanRecord::new(self.category.clone(), &self.urls)?);
            records.push(ScanRecord::new(ScanCategory::Profiles, &self.profiles)?);
        }
        Ok(records)
    }
}

/// Consumes scan events, enriching partial results on the way.
#[derive(Clone)]
pub struct ScanPipeline {
    enricher: Arc<dyn ProfileEnricher>,
}

impl Default for ScanPipeline {
    fn default() -> Self {
        Self::new(Arc::new(NoopEnricher))
    }
}

impl ScanPipeline {
    /// Create a pipeline that enriches with `enricher`.
    #[must_use]
    pub fn new(enricher: Arc<dyn ProfileEnricher>) -> Self {
        Self { enricher }
    }

    /// Drive `handle` to its terminal event.
    ///
    /// Every event is passed to each of `handlers` before the pipeline acts on
    /// it. A `Failed` event becomes [`ScanError::Failed`]; a stream that ends
    /// without a terminal event becomes [`ScanError::Interrupted`].
    pub async fn run(
        &self,
        handle: ScanHandle,
        handlers: &mut [&mut dyn EventHandler],
    ) -> Result<ScanSummary> {
        let mut summary = ScanSummary {
            scan_id: handle.scan_id,
            category: handle.category.clone(),
            target: handle.target.clone(),
            urls: Vec::new(),
            profiles: Vec::new(),
            record: None,
            started_at: Timestamp::now(),
            finished_at: Timestamp::now(),
        };
        let (mut events, task) = handle.into_parts();

        let outcome = loop {
            let Some(event) = events.recv().await else {
                break Err(ScanError::Interrupted);
            };
            for handler in handlers.iter_mut() {
                handler.handle(&event).await;
            }

            match event {
                ScanEvent::Started | ScanEvent::Progress { .. } => {}
                ScanEvent::PartialResult { site, url, .. } => {
                    let profile = self.enricher.enrich(&url, &site).await;
                    debug!(site = %site, enriched = profile.has_details(), "collected account");
                    summary.urls.push(url);
                    summary.profiles.push(profile);
                }
                ScanEvent::Finished { record } => {
                    summary.record = record;
                    break Ok(());
                }
                ScanEvent::Failed { message } => break Err(ScanError::Failed(message)),
            }
        };

        if let Err(e) = task.await {
            warn!(scan_id = %summary.scan_id, error = %e, "scan task did not exit cleanly");
        }

        outcome?;
        summary.finished_at = Timestamp::now();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(category: ScanCategory) -> ScanSummary {
        ScanSummary {
            scan_id: Uuid::new_v4(),
            category,
            target: TargetName::new("octocat").expect("valid"),
            urls: Vec::new(),
            profiles: Vec::new(),
            record: None,
            started_at: Timestamp::now(),
            finished_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_enumeration_records() {
        let mut summary = summary(ScanCategory::Username);
        summary.urls.push("https://github.com/octocat".to_string());
        summary.profiles.push(ProfileRecord::new("GitHub", "https://github.com/octocat"));

        let records = summary.records().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, ScanCategory::Username);
        assert_eq!(records[0].payload, json!(["https://github.com/octocat"]));
        assert_eq!(records[1].category, ScanCategory::Profiles);
        assert_eq!(records[1].payload[0]["site"], json!("GitHub"));
    }

    #[test]
    fn test_empty_enumeration_records_both_lists() {
        let records = summary(ScanCategory::Username).records().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, ScanCategory::Username);
        assert_eq!(records[0].payload, json!([]));
        assert_eq!(records[1].category, ScanCategory::Profiles);
        assert_eq!(records[1].payload, json!([]));
    }

    #[test]
    fn test_single_shot_record() {
        let mut summary = summary(ScanCategory::Domain);
        summary.record = Some(json!({ "registrar": "ACME" }));
        let records = summary.records().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, ScanCategory::Domain);
        assert_eq!(records[0].payload, json!({ "registrar": "ACME" }));
    }
}
