use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::json_file::{read_json, write_json};
use crate::error::{AppError, Result};
use crate::models::UploadRecord;
use crate::storage::{StorageBackend, StoredObject};

/// Ordered, append-only list of uploaded files
///
/// `list` always reflects current state: calling it again after a `record`
/// sees the new entry at the tail.
#[async_trait]
pub trait UploadIndex: Send + Sync + 'static {
    async fn record(&self, entry: UploadRecord) -> Result<()>;

    async fn list(&self) -> Result<Vec<UploadRecord>>;
}

// =============================================================================
// In-memory index
// =============================================================================

/// Index held only in process memory; lost on restart
#[derive(Default)]
pub struct MemoryUploadIndex {
    entries: RwLock<Vec<UploadRecord>>,
}

impl MemoryUploadIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadIndex for MemoryUploadIndex {
    async fn record(&self, entry: UploadRecord) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UploadRecord>> {
        Ok(self.entries.read().await.clone())
    }
}

// =============================================================================
// JSON file index
// =============================================================================

/// Index persisted as a JSON array, rewritten whole on every append
///
/// Appends are serialized through `write_lock`, so concurrent `record` calls
/// never lose each other's entries.
pub struct JsonUploadIndex {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonUploadIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UploadIndex for JsonUploadIndex {
    async fn record(&self, entry: UploadRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries: Vec<UploadRecord> = read_json(&self.path).await?;
        entries.push(entry);
        write_json(&self.path, &entries).await?;

        tracing::debug!("Upload index now holds {} entries", entries.len());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UploadRecord>> {
        read_json(&self.path).await
    }
}

// =============================================================================
// Backend-delegated index
// =============================================================================

/// Index reconstructed from the storage backend on every listing
///
/// The backend is the source of truth, so `record` keeps nothing.
pub struct BackendUploadIndex {
    backend: Arc<dyn StorageBackend>,
}

impl BackendUploadIndex {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }
}

impl From<StoredObject> for UploadRecord {
    fn from(object: StoredObject) -> Self {
        UploadRecord {
            original_name: object.name,
            storage_ref: object.storage_ref,
            storage_id: object.storage_id,
            content_type: object.content_type,
            size_bytes: object.size_bytes,
            uploaded_by: None,
            uploaded_at: None,
        }
    }
}

#[async_trait]
impl UploadIndex for BackendUploadIndex {
    async fn record(&self, _entry: UploadRecord) -> Result<()> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UploadRecord>> {
        let objects = self.backend.list().await.map_err(|e| {
            tracing::error!("Listing from {} backend failed: {}", self.backend.name(), e);
            AppError::BackendUnavailable(e.to_string())
        })?;

        Ok(objects.into_iter().map(UploadRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StagedUpload, StorageError, StorageResult};
    use tempfile::TempDir;

    fn entry(name: &str) -> UploadRecord {
        UploadRecord::new(name, format!("/uploads/{}", name), Some(name.to_string()))
    }

    #[tokio::test]
    async fn test_memory_index_keeps_insertion_order() {
        let index = MemoryUploadIndex::new();
        index.record(entry("b.txt")).await.unwrap();
        index.record(entry("a.txt")).await.unwrap();

        let names: Vec<_> = index
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.original_name)
            .collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_json_index_round_trip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploads.json");

        let index = JsonUploadIndex::new(&path);
        index.record(entry("first.txt")).await.unwrap();
        let second = entry("second.txt");
        index.record(second.clone()).await.unwrap();

        let reopened = JsonUploadIndex::new(&path);
        let list = reopened.list().await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.last(), Some(&second));
        assert_eq!(list[0].original_name, "first.txt");
    }

    #[tokio::test]
    async fn test_json_index_empty_when_missing() {
        let dir = TempDir::new().unwrap();
        let index = JsonUploadIndex::new(dir.path().join("uploads.json"));
        assert!(index.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_index_allows_duplicate_names() {
        let dir = TempDir::new().unwrap();
        let index = JsonUploadIndex::new(dir.path().join("uploads.json"));

        index.record(entry("same.txt")).await.unwrap();
        index.record(entry("same.txt")).await.unwrap();

        assert_eq!(index.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_json_index_concurrent_records_all_persist() {
        let dir = TempDir::new().unwrap();
        let index = Arc::new(JsonUploadIndex::new(dir.path().join("uploads.json")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let index = index.clone();
                tokio::spawn(async move { index.record(entry(&format!("f{}.txt", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let list = index.list().await.unwrap();
        assert_eq!(list.len(), 16);
        for i in 0..16 {
            let name = format!("f{}.txt", i);
            assert!(list.iter().any(|r| r.original_name == name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_json_index_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploads.json");
        std::fs::write(&path, "not json").unwrap();

        let index = JsonUploadIndex::new(&path);
        assert!(matches!(index.list().await, Err(AppError::CorruptState(_))));
        assert!(matches!(
            index.record(entry("x")).await,
            Err(AppError::CorruptState(_))
        ));
    }

    struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn store(&self, _upload: StagedUpload<'_>) -> StorageResult<StoredObject> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn delete(&self, _object: &StoredObject) -> StorageResult<()> {
            Ok(())
        }

        async fn list(&self) -> StorageResult<Vec<StoredObject>> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_backend_index_failure_is_backend_unavailable() {
        let index = BackendUploadIndex::new(Arc::new(FailingBackend));

        match index.list().await {
            Err(AppError::BackendUnavailable(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("expected BackendUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backend_index_reads_live_listing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("live.txt"), b"x").unwrap();

        let backend = Arc::new(crate::storage::LocalBackend::new(&root));
        let index = BackendUploadIndex::new(backend);

        let list = index.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].original_name, "live.txt");
        assert_eq!(list[0].storage_ref, "/uploads/live.txt");

        // Record is a no-op, listing still reflects the backend
        index.record(entry("ghost.txt")).await.unwrap();
        assert_eq!(index.list().await.unwrap().len(), 1);
    }
}
