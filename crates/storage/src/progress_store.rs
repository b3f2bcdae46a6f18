//! On-device progress snapshot, persisted as one JSON array under a fixed key.

use std::sync::Arc;

use lingua_core::TenseCatalog;
use lingua_core::model::TenseProgress;
use serde_json::Value;
use tracing::{debug, warn};

use crate::repository::{KeyValueStore, StorageError};

/// Storage key holding the serialized snapshot.
pub const PROGRESS_KEY: &str = "lingua_core_progress";

/// Owns the local snapshot: one record per catalog tense, read and replaced
/// wholesale.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
    catalog: &'static TenseCatalog,
}

impl ProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, catalog: &'static TenseCatalog) -> Self {
        Self { kv, catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &'static TenseCatalog {
        self.catalog
    }

    /// Current snapshot, or the catalog seed when nothing is stored yet.
    ///
    /// Entries that fail to decode are dropped one by one and refilled from
    /// the catalog; a payload that is not a JSON array at all reads as the
    /// catalog seed. Both cases are logged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend read fails. Callers must not
    /// write anything derived from a failed read.
    pub async fn read(&self) -> Result<Vec<TenseProgress>, StorageError> {
        let Some(raw) = self.kv.get_string(PROGRESS_KEY).await? else {
            return Ok(self.catalog.default_snapshot());
        };

        let entries = match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, "stored progress is not a JSON array, using catalog defaults");
                return Ok(self.catalog.default_snapshot());
            }
        };

        let records = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<TenseProgress>(entry) {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(%error, "dropping undecodable progress entry");
                    None
                }
            })
            .collect();
        Ok(self.catalog.normalize(records))
    }

    /// Replace the whole snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization fails or the medium rejects
    /// the write; the caller's copy stays authoritative in that case.
    pub async fn write(&self, records: &[TenseProgress]) -> Result<(), StorageError> {
        let payload = serde_json::to_string(records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.set_string(PROGRESS_KEY, &payload).await?;
        debug!(records = records.len(), bytes = payload.len(), "local progress written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryKeyValueStore;
    use lingua_core::model::{Percent, TenseStatus};
    use lingua_core::time::fixed_now;

    struct BrokenStore;

    #[async_trait::async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get_string(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Connection("database is locked".into()))
        }

        async fn set_string(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Connection("database is locked".into()))
        }
    }

    fn store_over(kv: InMemoryKeyValueStore) -> ProgressStore {
        ProgressStore::new(Arc::new(kv), TenseCatalog::builtin())
    }

    #[tokio::test]
    async fn empty_store_reads_catalog_defaults() {
        let store = store_over(InMemoryKeyValueStore::new());
        assert_eq!(store.read().await.unwrap(), TenseCatalog::builtin().default_snapshot());
    }

    #[tokio::test]
    async fn write_then_read_keeps_mutations() {
        let store = store_over(InMemoryKeyValueStore::new());
        let mut snapshot = store.read().await.unwrap();
        snapshot[0] = snapshot[0].updated(Percent::FULL, TenseStatus::Mastered, fixed_now());
        store.write(&snapshot).await.unwrap();

        let reread = store.read().await.unwrap();
        assert_eq!(reread, snapshot);
        assert_eq!(reread[0].updated_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn corrupt_payload_falls_back_to_defaults() {
        let kv = InMemoryKeyValueStore::new();
        kv.set_string(PROGRESS_KEY, "{not json").await.unwrap();
        let store = store_over(kv);
        assert_eq!(
            store.read().await.unwrap(),
            TenseCatalog::builtin().default_snapshot()
        );
    }

    #[tokio::test]
    async fn bad_entry_is_dropped_without_losing_the_rest() {
        let kv = InMemoryKeyValueStore::new();
        kv.set_string(
            PROGRESS_KEY,
            r#"[{"id":"fut_simple","progress":60,"status":"IN_PROGRESS","updated_at":"2024-06-01T00:00:00Z"},
                {"id":"past_perf","progress":101,"status":"IN_PROGRESS"},
                {"id":"pres_perf","progress":80,"status":"IN_PROGRESS","updated_at":"2024-06-02T00:00:00Z"}]"#,
        )
        .await
        .unwrap();
        let snapshot = store_over(kv).read().await.unwrap();

        let find = |id: &str| snapshot.iter().find(|r| r.id.as_str() == id).unwrap();
        assert_eq!(find("fut_simple").progress.value(), 60);
        assert_eq!(find("pres_perf").progress.value(), 80);
        assert_eq!(find("past_perf").progress, Percent::ZERO);
        assert_eq!(find("past_perf").status, TenseStatus::Locked);
    }

    #[tokio::test]
    async fn backend_failure_is_not_read_as_empty() {
        let store = ProgressStore::new(Arc::new(BrokenStore), TenseCatalog::builtin());
        assert!(matches!(
            store.read().await,
            Err(StorageError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn partial_payload_is_completed_from_catalog() {
        let kv = InMemoryKeyValueStore::new();
        kv.set_string(
            PROGRESS_KEY,
            r#"[{"id":"fut_simple","progress":60,"status":"IN_PROGRESS","updated_at":"2024-06-01T00:00:00Z"}]"#,
        )
        .await
        .unwrap();
        let snapshot = store_over(kv).read().await.unwrap();

        assert_eq!(snapshot.len(), 12);
        let fut = snapshot
            .iter()
            .find(|r| r.id.as_str() == "fut_simple")
            .unwrap();
        assert_eq!(fut.progress.value(), 60);
        assert!(fut.updated_at.is_some());
    }

    #[tokio::test]
    async fn quota_failure_is_reported() {
        let store = store_over(InMemoryKeyValueStore::with_quota(16));
        let snapshot = store.read().await.unwrap();
        let err = store.write(&snapshot).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }
}
