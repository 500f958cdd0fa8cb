//! In-process identity store.

use crate::error::Result;
use crate::store::IdentityStore;
use async_trait::async_trait;
use osprey_core::{ScanCategory, Target, TargetName};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// [`IdentityStore`] that keeps records in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    targets: RwLock<BTreeMap<TargetName, BTreeMap<ScanCategory, Value>>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self, name: &TargetName) -> Target {
        let mut target = Target::new(name.clone());
        if let Some(records) = self.targets.read().await.get(name) {
            for (category, payload) in records {
                target.insert(category.clone(), payload.clone());
            }
        }
        target
    }

    async fn save(
        &self,
        name: &TargetName,
        category: &ScanCategory,
        payload: &Value,
    ) -> Result<()> {
        self.targets
            .write()
            .await
            .entry(name.clone())
            .or_default()
            .insert(category.clone(), payload.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TargetName>> {
        Ok(self.targets.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &TargetName) -> Result<bool> {
        Ok(self.targets.write().await.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryIdentityStore::new();
        let b = TargetName::new("b.example").expect("valid");
        let a = TargetName::new("a.example").expect("valid");

        store
            .save(&b, &ScanCategory::Domain, &json!({ "registrar": "ACME" }))
            .await
            .expect("save");
        store
            .save(&a, &ScanCategory::Username, &json!([]))
            .await
            .expect("save");

        assert_eq!(store.list().await.expect("list"), vec![a.clone(), b.clone()]);
        assert_eq!(
            store.load(&b).await.record(&ScanCategory::Domain),
            Some(&json!({ "registrar": "ACME" }))
        );
        assert!(store.load(&TargetName::new("c").expect("valid")).await.is_empty());

        assert!(store.delete(&a).await.expect("delete"));
        assert_eq!(store.list().await.expect("list"), vec![b]);
    }
}
