use axum::{
    extract::{multipart::Field, Multipart, State},
    response::Html,
    Extension,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use super::gate::CurrentUser;
use crate::constants::UPLOAD_FIELD_NAME;
use crate::error::{AppError, Result};
use crate::html;
use crate::models::UploadRecord;
use crate::security::sanitize_filename;
use crate::storage::{ResourceKind, StagedUpload};
use crate::AppState;

/// An upload written to a temp file in the staging directory
///
/// `discard` removes the file once the backend call settles. If the value is
/// dropped first (an error, or the request future dropped mid-stream), the
/// drop removes it instead.
pub struct StagedFile {
    path: TempPath,
    size_bytes: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Delete the staged file off the runtime's worker thread
    ///
    /// If the async removal fails, the guard stays armed and retries on drop.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove staged file {}: {}", self.path.display(), e);
                return;
            }
        }
        if let Err(e) = self.path.keep() {
            tracing::debug!("Staged file guard already released: {}", e);
        }
    }
}

/// Stream a multipart field into a new temp file under `dir`
async fn stage_field(mut field: Field<'_>, dir: &Path, max_bytes: usize) -> Result<StagedFile> {
    tokio::fs::create_dir_all(dir).await?;

    let dir: PathBuf = dir.to_path_buf();
    let path = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&dir)
            .map(|file| file.into_temp_path())
    })
    .await??;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&path)
        .await?;

    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        size_bytes += chunk.len() as u64;
        if size_bytes > max_bytes as u64 {
            tracing::warn!("Upload exceeded {} bytes, aborting", max_bytes);
            return Err(AppError::PayloadTooLarge);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(StagedFile { path, size_bytes })
}

/// Receive a single file and hand it to the storage backend
///
/// POST /upload (multipart, field `file`)
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Html<String>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let name = sanitize_filename(&raw_name)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid file name: {:?}", raw_name)))?;
        let content_type = field.content_type().map(str::to_string);

        let staged = stage_field(
            field,
            &state.config.staging_dir(),
            state.config.max_upload_bytes,
        )
        .await?;

        tracing::info!(
            "Received {} ({} bytes) from {}",
            name,
            staged.size_bytes(),
            user.username
        );

        let stored = state
            .backend
            .store(StagedUpload {
                path: staged.path(),
                name: &name,
                content_type: content_type.as_deref(),
                size_bytes: staged.size_bytes(),
                kind: ResourceKind::Auto,
            })
            .await;

        // Staged copy goes away once the backend call has settled, either way
        staged.discard().await;

        let stored = stored.map_err(|e| {
            tracing::warn!("Storing {} failed: {}", name, e);
            AppError::UploadFailed(e.to_string())
        })?;

        let record = UploadRecord {
            original_name: name,
            storage_ref: stored.storage_ref.clone(),
            storage_id: stored.storage_id.clone(),
            content_type: stored.content_type.clone().or(content_type),
            size_bytes: stored.size_bytes,
            uploaded_by: Some(user.username),
            uploaded_at: Some(Utc::now()),
        };

        // Unrecorded objects are rolled back so the name stays free
        if let Err(e) = state.uploads.record(record.clone()).await {
            tracing::error!("Recording {} failed, removing stored object", record.original_name);
            if let Err(rollback) = state.backend.delete(&stored).await {
                tracing::error!("Rollback of {} failed: {}", record.original_name, rollback);
            }
            return Err(e);
        }

        return Ok(html::upload_confirmation(&record));
    }

    Err(AppError::InvalidInput("No file provided".to_string()))
}
