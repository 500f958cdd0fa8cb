//! The storage interface shared by every backend.

use crate::error::Result;
use async_trait::async_trait;
use osprey_core::{ScanCategory, ScanRecord, Target, TargetName};
use serde_json::Value;

/// Durable per-target, per-category records.
///
/// Each `(target, category)` pair holds at most one payload. Saving replaces
/// that payload and leaves the target's other categories alone.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Every record persisted for `name`.
    ///
    /// Never fails: unreadable storage is logged and yields an empty target.
    async fn load(&self, name: &TargetName) -> Target;

    /// Persist `payload` as the `category` record of `name`.
    async fn save(&self, name: &TargetName, category: &ScanCategory, payload: &Value)
        -> Result<()>;

    /// Names of every persisted target, sorted.
    async fn list(&self) -> Result<Vec<TargetName>>;

    /// Remove every record of `name`. Returns whether anything was removed.
    async fn delete(&self, name: &TargetName) -> Result<bool>;

    /// Persist a [`ScanRecord`].
    async fn save_record(&self, name: &TargetName, record: &ScanRecord) -> Result<()> {
        self.save(name, &record.category, &record.payload).await
    }
}
