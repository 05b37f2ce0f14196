//! Local disk backend: files are kept under the uploads directory and served
//! back by the server at `/uploads/<name>`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{StagedUpload, StorageBackend, StorageError, StorageResult, StoredObject};

pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Public path a stored file is served from
    pub fn storage_ref(name: &str) -> String {
        format!("/uploads/{}", urlencoding::encode(name))
    }

    fn object(name: String, size_bytes: u64) -> StoredObject {
        StoredObject {
            storage_ref: Self::storage_ref(&name),
            storage_id: Some(name.clone()),
            content_type: mime_guess::from_path(&name).first().map(|m| m.to_string()),
            size_bytes: Some(size_bytes),
            name,
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(&self, upload: StagedUpload<'_>) -> StorageResult<StoredObject> {
        fs::create_dir_all(&self.root).await?;
        let dest = self.root.join(upload.name);

        // create_new makes the existence check and the claim a single step
        let mut out = match OpenOptions::new().write(true).create_new(true).open(&dest).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!("Upload collides with existing file: {}", upload.name);
                return Err(StorageError::AlreadyExists(upload.name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let copied = async {
            let mut src = fs::File::open(upload.path).await?;
            let n = tokio::io::copy(&mut src, &mut out).await?;
            out.flush().await?;
            out.sync_all().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        match copied {
            Ok(n) => {
                tracing::debug!("Stored {} ({} bytes) at {}", upload.name, n, dest.display());
                Ok(Self::object(upload.name.to_string(), n))
            }
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(&dest).await;
                Err(e.into())
            }
        }
    }

    async fn delete(&self, object: &StoredObject) -> StorageResult<()> {
        match fs::remove_file(self.root.join(&object.name)).await {
            Ok(()) => {
                tracing::debug!("Removed {} from {}", object.name, self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<StoredObject>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries: Vec<(SystemTime, String, u64)> = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !meta.is_file() || name.starts_with('.') {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, name, meta.len()));
        }

        entries.sort();
        Ok(entries
            .into_iter()
            .map(|(_, name, size)| Self::object(name, size))
            .collect())
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
