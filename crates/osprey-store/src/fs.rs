//! Filesystem-backed identity store.
//!
//! Layout: `<root>/<target>/<storage_key>.json`, one pretty-printed JSON
//! document per category. Writes go to a sibling temp file that is then
//! renamed over the record, so readers never see a half-written file.

use crate::error::{Result, StoreError};
use crate::store::IdentityStore;
use async_trait::async_trait;
use osprey_core::{AppConfig, ScanCategory, Target, TargetName};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// [`IdentityStore`] that keeps one directory per target.
#[derive(Debug, Clone)]
pub struct FsIdentityStore {
    root: PathBuf,
}

impl FsIdentityStore {
    /// Store records under `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store records in the configured targets directory.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.targets_dir()?))
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_dir(&self, name: &TargetName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Path of the file holding `category` for `name`.
    #[must_use]
    pub fn record_path(&self, name: &TargetName, category: &ScanCategory) -> PathBuf {
        self.target_dir(name)
            .join(format!("{}.{RECORD_EXTENSION}", category.storage_key()))
    }

    async fn read_records(&self, name: &TargetName) -> Result<Target> {
        let dir = self.target_dir(name);
        let mut target = Target::new(name.clone());

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(target = %name, "no records for target");
                return Ok(target);
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match read_payload(&path).await {
                Ok(payload) => {
                    target.insert(ScanCategory::from_storage_key(key), payload);
                }
                Err(e) => warn!(target = %name, path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        debug!(target = %name, records = target.len(), "loaded target");
        Ok(target)
    }
}

async fn read_payload(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

#[async_trait]
impl IdentityStore for FsIdentityStore {
    async fn load(&self, name: &TargetName) -> Target {
        match self.read_records(name).await {
            Ok(target) => target,
            Err(e) => {
                warn!(target = %name, error = %e, "failed to load target, treating as empty");
                Target::new(name.clone())
            }
        }
    }

    async fn save(
        &self,
        name: &TargetName,
        category: &ScanCategory,
        payload: &Value,
    ) -> Result<()> {
        let dir = self.target_dir(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let path = self.record_path(name, category);
        let temp = path.with_extension(TEMP_EXTENSION);
        let contents = serde_json::to_string_pretty(payload)?;

        fs::write(&temp, contents)
            .await
            .map_err(|e| StoreError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::io(&path, e));
        }

        info!(target = %name, category = %category, "saved record");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TargetName>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let raw = entry.file_name();
            let Some(raw) = raw.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 target directory");
                continue;
            };
            match TargetName::new(raw) {
                Ok(name) => names.push(name),
                Err(e) => warn!(name = raw, error = %e, "skipping invalid target directory"),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &TargetName) -> Result<bool> {
        let dir = self.target_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(target = %name, "deleted target");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osprey_core::ScanRecord;
    use serde_json::json;
    use tempfile::TempDir;

    fn name(s: &str) -> TargetName {
        TargetName::new(s).expect("valid target")
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("example.com");
        let payload = json!({ "registrar": "ACME", "emails": ["a@x.com"] });

        store
            .save(&target, &ScanCategory::Domain, &payload)
            .await
            .expect("save");

        let loaded = store.load(&target).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.record(&ScanCategory::Domain), Some(&payload));
    }

    #[tokio::test]
    async fn test_storage_layout_uses_storage_keys() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("8.8.8.8");

        store
            .save(&target, &ScanCategory::IpAddress, &json!({ "handle": "NET-8" }))
            .await
            .expect("save");

        let path = tmp.path().join("8.8.8.8").join("ip_address.json");
        assert_eq!(store.record_path(&target, &ScanCategory::IpAddress), path);
        let written = std::fs::read_to_string(&path).expect("record file exists");
        assert!(written.contains("\n  \"handle\""), "record is pretty-printed");
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = store.load(&target).await;
        assert!(loaded.record(&ScanCategory::IpAddress).is_some());
    }

    #[tokio::test]
    async fn test_save_replaces_only_its_category() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("octocat");

        store
            .save(&target, &ScanCategory::Username, &json!(["https://github.com/octocat"]))
            .await
            .expect("save username");
        store
            .save(&target, &ScanCategory::Domain, &json!({ "registrar": "Old" }))
            .await
            .expect("save domain");
        store
            .save(&target, &ScanCategory::Domain, &json!({ "registrar": "New" }))
            .await
            .expect("overwrite domain");

        let loaded = store.load(&target).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.record(&ScanCategory::Domain),
            Some(&json!({ "registrar": "New" }))
        );
        assert_eq!(
            loaded.record(&ScanCategory::Username),
            Some(&json!(["https://github.com/octocat"]))
        );
    }

    #[tokio::test]
    async fn test_load_unknown_target_is_empty() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let loaded = store.load(&name("nobody")).await;
        assert!(loaded.is_empty());
        assert_eq!(loaded.name().as_str(), "nobody");
    }

    #[tokio::test]
    async fn test_corrupt_record_is_skipped() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("example.com");

        store
            .save(&target, &ScanCategory::Domain, &json!({ "registrar": "ACME" }))
            .await
            .expect("save");
        std::fs::write(tmp.path().join("example.com").join("username.json"), "{ not json")
            .expect("write corrupt record");
        std::fs::write(tmp.path().join("example.com").join("notes.txt"), "ignored")
            .expect("write stray file");

        let loaded = store.load(&target).await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.record(&ScanCategory::Domain).is_some());
    }

    #[tokio::test]
    async fn test_unknown_category_round_trips() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("Jane Doe");
        let category = ScanCategory::Other("Real Name".to_string());

        store
            .save(&target, &category, &json!([{ "title": "Jane" }]))
            .await
            .expect("save");
        assert!(tmp.path().join("Jane Doe").join("real_name.json").exists());

        let loaded = store.load(&target).await;
        assert_eq!(loaded.categories().collect::<Vec<_>>(), vec![&category]);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        assert!(store.list().await.expect("list empty").is_empty());

        for target in ["zeta", "alpha", "Mid"] {
            store
                .save(&name(target), &ScanCategory::Username, &json!([]))
                .await
                .expect("save");
        }
        std::fs::write(tmp.path().join("stray.json"), "{}").expect("write stray file");

        let names: Vec<String> = store
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, vec!["Mid", "alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path().join("never-created"));
        assert!(store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FsIdentityStore::new(tmp.path());
        let target = name("octocat");

        let record = ScanRecord::new(ScanCategory::Username, &vec!["https://github.com/octocat"])
            .expect("record");
        store.save_record(&target, &record).await.expect("save");

        assert!(store.delete(&target).await.expect("delete"));
        assert!(!store.delete(&target).await.expect("delete again"));
        assert!(store.load(&target).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_into_unwritable_root_fails() {
        let tmp = TempDir::new().expect("create temp dir");
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").expect("write file");

        let store = FsIdentityStore::new(&blocker);
        let result = store
            .save(&name("octocat"), &ScanCategory::Username, &json!([]))
            .await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
