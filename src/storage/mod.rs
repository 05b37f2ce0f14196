//! Storage backends: where uploaded bytes end up.
//!
//! The server only needs two things from a backend: take a staged file and
//! return a durable reference to it, and (optionally) list what it holds.

pub mod cloudinary;
pub mod local;
pub mod supabase;

pub use cloudinary::CloudinaryBackend;
pub use local::LocalBackend;
pub use supabase::SupabaseBackend;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::StorageConfig;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed on its side
    #[error("{0}")]
    Unavailable(String),

    /// The backend answered but refused the request
    #[error("{0}")]
    Rejected(String),

    #[error("a file named {0} already exists")]
    AlreadyExists(String),

    #[error("{0} is not supported by this storage backend")]
    Unsupported(&'static str),

    #[error("unexpected response from storage backend: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// What kind of resource the bytes are, for backends that care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    /// Let the backend detect it from the content
    #[default]
    Auto,
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Auto => "auto",
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
            ResourceKind::Raw => "raw",
        }
    }
}

/// A fully received upload sitting in a local temp file
#[derive(Debug, Clone, Copy)]
pub struct StagedUpload<'a> {
    pub path: &'a Path,
    /// Sanitized original filename, also used as the object name
    pub name: &'a str,
    pub content_type: Option<&'a str>,
    pub size_bytes: u64,
    pub kind: ResourceKind,
}

impl StagedUpload<'_> {
    /// Declared content type, falling back to a guess from the name
    pub fn content_type_or_guess(&self) -> String {
        self.content_type
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(self.name)
                    .first_or_octet_stream()
                    .to_string()
            })
    }
}

/// An object held by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    /// URL or server path the object can be retrieved from
    pub storage_ref: String,
    pub storage_id: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Object storage the upload handler writes to.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Short identifier used in logs and the health check
    fn name(&self) -> &'static str;

    /// Store a staged upload under its name
    ///
    /// An existing object with the same name is never replaced; the call fails
    /// with `StorageError::AlreadyExists` instead.
    async fn store(&self, upload: StagedUpload<'_>) -> StorageResult<StoredObject>;

    /// Remove a stored object
    ///
    /// Used to roll back a store whose upload could not be recorded. Removing
    /// an object that is already gone succeeds.
    async fn delete(&self, object: &StoredObject) -> StorageResult<()>;

    /// List stored objects, oldest first
    async fn list(&self) -> StorageResult<Vec<StoredObject>> {
        Err(StorageError::Unsupported("listing"))
    }

    /// Directory served under `/uploads` when files live on local disk
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Build the backend selected in configuration
pub fn build_backend(
    storage: &StorageConfig,
    uploads_dir: PathBuf,
) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match storage {
        StorageConfig::Local => Arc::new(LocalBackend::new(uploads_dir)),
        StorageConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
        } => Arc::new(CloudinaryBackend::new(
            http_client()?,
            cloud_name.clone(),
            api_key.clone(),
            api_secret.clone(),
        )),
        StorageConfig::Supabase { url, key, bucket } => Arc::new(SupabaseBackend::new(
            http_client()?,
            url.clone(),
            key.clone(),
            bucket.clone(),
        )),
    };

    tracing::info!("Using {} storage backend", backend.name());
    Ok(backend)
}

fn http_client() -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("file-drop-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| StorageError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

/// Read the error message out of a failed JSON API response
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or(body);

    if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_prefers_declared() {
        let upload = StagedUpload {
            path: Path::new("/tmp/x"),
            name: "report.pdf",
            content_type: Some("application/x-custom"),
            size_bytes: 0,
            kind: ResourceKind::Auto,
        };
        assert_eq!(upload.content_type_or_guess(), "application/x-custom");
    }

    #[test]
    fn test_content_type_guessed_from_name() {
        let upload = StagedUpload {
            path: Path::new("/tmp/x"),
            name: "report.pdf",
            content_type: None,
            size_bytes: 0,
            kind: ResourceKind::Auto,
        };
        assert_eq!(upload.content_type_or_guess(), "application/pdf");

        let unknown = StagedUpload {
            name: "blob.zzzunknown",
            ..upload
        };
        assert_eq!(unknown.content_type_or_guess(), "application/octet-stream");
    }

    #[test]
    fn test_resource_kind_default_is_auto() {
        assert_eq!(ResourceKind::default().as_str(), "auto");
    }
}
