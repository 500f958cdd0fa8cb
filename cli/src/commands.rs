//! Subcommand implementations. Each returns the text to print on stdout.

use anyhow::{bail, Context, Result};
use osprey_core::{AppConfig, ScanCategory, TargetName};
use osprey_correlate::{build_graph, find_correlations};
use osprey_scanner::{
    EventHandler, HttpProfileEnricher, LogHandler, NoopEnricher, ProfileEnricher, ScanHandle,
    ScanPipeline, ScanSummary, ScanWorker,
};
use osprey_store::IdentityStore;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// How `scan` should treat its results.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Persist records to the store
    pub save: bool,
    /// Enrich discovered accounts
    pub enrich: bool,
}

/// What `correlate` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelateView {
    Correlations,
    Graph,
    Dot,
}

fn target_name(raw: &str) -> Result<TargetName> {
    TargetName::new(raw.trim()).with_context(|| format!("invalid target name {raw:?}"))
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("rendering output")
}

pub async fn scan(
    config: &AppConfig,
    store: &dyn IdentityStore,
    category: &str,
    target: &str,
    options: ScanOptions,
) -> Result<String> {
    let category: ScanCategory = category.parse().context("invalid scan category")?;
    let target = target_name(target)?;

    let worker = ScanWorker::from_config(config).context("building collectors")?;
    if !worker.supports(&category) {
        bail!("cannot scan category {category}");
    }

    let enricher: Arc<dyn ProfileEnricher> = if options.enrich {
        Arc::new(HttpProfileEnricher::from_config(config).context("building enricher")?)
    } else {
        Arc::new(NoopEnricher)
    };

    let handle = worker.run(category, target);
    let summary = run_until_interrupted(handle, &ScanPipeline::new(enricher)).await?;
    finish_scan(store, &summary, options.save).await
}

async fn run_until_interrupted(handle: ScanHandle, pipeline: &ScanPipeline) -> Result<ScanSummary> {
    let cancel = handle.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling scan");
            cancel.cancel();
        }
    });

    let mut log = LogHandler;
    let mut handlers: [&mut dyn EventHandler; 1] = [&mut log];
    let result = pipeline.run(handle, &mut handlers).await;
    watcher.abort();

    result.context("scan did not complete")
}

async fn finish_scan(store: &dyn IdentityStore, summary: &ScanSummary, save: bool) -> Result<String> {
    if save {
        for record in summary.records().context("preparing records")? {
            store
                .save_record(&summary.target, &record)
                .await
                .with_context(|| format!("saving {} record", record.category))?;
        }
        info!(target = %summary.target, "scan results saved");
    }
    pretty(summary)
}

pub async fn targets(store: &dyn IdentityStore) -> Result<String> {
    let names = store.list().await.context("listing targets")?;
    pretty(&names)
}

pub async fn show(store: &dyn IdentityStore, target: &str) -> Result<String> {
    let target = store.load(&target_name(target)?).await;
    if target.is_empty() {
        bail!("no records for target {}", target.name());
    }

    let records: Map<String, Value> = target
        .records()
        .map(|(category, payload)| (category.label().to_string(), payload.clone()))
        .collect();
    pretty(&json!({ "name": target.name(), "records": records }))
}

pub async fn correlate(store: &dyn IdentityStore, target: &str, view: CorrelateView) -> Result<String> {
    let target = store.load(&target_name(target)?).await;
    let correlations = find_correlations(&target);
    if correlations.is_empty() {
        info!(target = %target.name(), "no correlations found");
    }

    match view {
        CorrelateView::Correlations => pretty(&correlations),
        CorrelateView::Graph => pretty(&build_graph(&target, &correlations)),
        CorrelateView::Dot => Ok(build_graph(&target, &correlations).to_dot()),
    }
}

pub async fn forget(store: &dyn IdentityStore, target: &str) -> Result<String> {
    let name = target_name(target)?;
    let removed = store
        .delete(&name)
        .await
        .with_context(|| format!("deleting {name}"))?;
    pretty(&json!({ "target": name, "removed": removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use osprey_core::{ProfileRecord, Timestamp};
    use osprey_store::{FsIdentityStore, MemoryIdentityStore};
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn seeded() -> MemoryIdentityStore {
        let store = MemoryIdentityStore::new();
        store
            .save(
                &TargetName::new("example.com").expect("valid"),
                &ScanCategory::Domain,
                &json!({
                    "emails": ["a@x.com", "b@x.com"],
                    "registrar": "ACME",
                    "name_servers": "ns1.x.com"
                }),
            )
            .await
            .expect("seed");
        store
    }

    fn username_summary() -> ScanSummary {
        ScanSummary {
            scan_id: Uuid::nil(),
            category: ScanCategory::Username,
            target: TargetName::new("octocat").expect("valid"),
            urls: vec!["https://github.com/octocat".to_string()],
            profiles: vec![ProfileRecord::new("GitHub", "https://github.com/octocat")],
            record: None,
            started_at: Timestamp::now(),
            finished_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_targets_and_show() {
        let store = seeded().await;

        let listed: Vec<String> =
            serde_json::from_str(&targets(&store).await.expect("targets")).expect("json");
        assert_eq!(listed, vec!["example.com"]);

        let shown: Value =
            serde_json::from_str(&show(&store, "example.com").await.expect("show")).expect("json");
        assert_eq!(shown["name"], json!("example.com"));
        assert_eq!(shown["records"]["Domain"]["registrar"], json!("ACME"));

        assert!(show(&store, "nobody").await.is_err());
        assert!(show(&store, "../etc").await.is_err());
    }

    #[tokio::test]
    async fn test_correlate_views() {
        let store = seeded().await;

        let correlations: Value = serde_json::from_str(
            &correlate(&store, "example.com", CorrelateView::Correlations)
                .await
                .expect("correlate"),
        )
        .expect("json");
        assert_eq!(
            correlations,
            json!({
                "emails": ["a@x.com", "b@x.com"],
                "registrar": "ACME",
                "name_servers": ["ns1.x.com"]
            })
        );

        let graph: Value = serde_json::from_str(
            &correlate(&store, "example.com", CorrelateView::Graph)
                .await
                .expect("graph"),
        )
        .expect("json");
        assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(5));
        assert_eq!(graph["edges"].as_array().map(Vec::len), Some(4));

        let dot = correlate(&store, "example.com", CorrelateView::Dot)
            .await
            .expect("dot");
        assert!(dot.starts_with("graph \"example.com\""));
    }

    #[tokio::test]
    async fn test_correlate_unknown_target_is_empty() {
        let store = MemoryIdentityStore::new();
        let out = correlate(&store, "nobody", CorrelateView::Correlations)
            .await
            .expect("correlate");
        assert_eq!(out, "{}");
    }

    #[tokio::test]
    async fn test_forget() {
        let store = seeded().await;
        let out: Value =
            serde_json::from_str(&forget(&store, "example.com").await.expect("forget")).expect("json");
        assert_eq!(out["removed"], json!(true));
        assert!(store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_finish_scan_saves_records() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let summary = username_summary();

        finish_scan(&store, &summary, true).await.expect("finish");
        assert!(tmp.path().join("octocat").join("username.json").exists());
        assert!(tmp.path().join("octocat").join("profiles.json").exists());

        let loaded = store.load(&summary.target).await;
        assert_eq!(
            loaded.record(&ScanCategory::Username),
            Some(&json!(["https://github.com/octocat"]))
        );
    }

    #[tokio::test]
    async fn test_empty_rescan_clears_previous_profiles() {
        let store = MemoryIdentityStore::new();
        let first = username_summary();
        finish_scan(&store, &first, true).await.expect("first scan");

        let mut rescan = username_summary();
        rescan.urls.clear();
        rescan.profiles.clear();
        finish_scan(&store, &rescan, true).await.expect("rescan");

        let loaded = store.load(&rescan.target).await;
        assert_eq!(loaded.record(&ScanCategory::Username), Some(&json!([])));
        assert_eq!(loaded.record(&ScanCategory::Profiles), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_finish_scan_without_save() {
        let store = MemoryIdentityStore::new();
        let out = finish_scan(&store, &username_summary(), false)
            .await
            .expect("finish");
        assert!(out.contains("https://github.com/octocat"));
        assert!(store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_scan_rejects_unsupported_category() {
        let store = MemoryIdentityStore::new();
        let options = ScanOptions {
            save: false,
            enrich: false,
        };
        let result = scan(&AppConfig::default(), &store, "profiles", "octocat", options).await;
        assert!(result.is_err());
    }
}
