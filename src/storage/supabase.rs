//! Supabase Storage backend.
//!
//! Objects go into a single bucket under their original filename. The bucket
//! is expected to be public; retrieval links are the public object URLs.
//! Supabase can also list the bucket, so this backend can serve as the source
//! of truth for the upload listing.

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tokio_util::io::ReaderStream;

use super::{error_message, StagedUpload, StorageBackend, StorageError, StorageResult, StoredObject};
use crate::constants::BACKEND_LIST_LIMIT;

/// Placeholder object Supabase creates for empty folders
const EMPTY_FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Id", default)]
    id: Option<String>,
    #[serde(rename = "Key", default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    /// Null for folders
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: Option<ObjectMetadata>,
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    mimetype: Option<String>,
}

impl SupabaseBackend {
    pub fn new(client: reqwest::Client, base_url: String, key: String, bucket: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            bucket,
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        )
    }

    fn list_url(&self) -> String {
        format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket)
    }

    /// Public retrieval URL for an object
    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
    }

    async fn list_page(&self, offset: usize) -> StorageResult<Vec<ListedObject>> {
        let response = self
            .authorized(self.client.post(self.list_url()))
            .json(&json!({
                "prefix": "",
                "limit": BACKEND_LIST_LIMIT,
                "offset": offset,
                "sortBy": { "column": "created_at", "order": "asc" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Unavailable(error_message(response).await));
        }

        response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))
    }

    fn listed_into_object(&self, listed: ListedObject) -> Option<StoredObject> {
        if listed.id.is_none() || listed.name == EMPTY_FOLDER_PLACEHOLDER {
            return None;
        }
        let (size_bytes, content_type) = match listed.metadata {
            Some(meta) => (meta.size, meta.mimetype),
            None => (None, None),
        };

        Some(StoredObject {
            storage_ref: self.public_url(&listed.name),
            storage_id: listed.id,
            content_type,
            size_bytes,
            name: listed.name,
        })
    }
}

/// Fetch a paged listing from offset 0 until a page comes back short
async fn collect_pages<T, F, Fut>(page_size: usize, mut fetch: F) -> StorageResult<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = StorageResult<Vec<T>>>,
{
    let mut all = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch(offset).await?;
        let fetched = page.len();
        all.extend(page);
        if fetched < page_size {
            return Ok(all);
        }
        offset += fetched;
    }
}

/// Supabase reports duplicates either as HTTP 409 or as a 400 whose body
/// carries `"statusCode": "409"`
fn is_duplicate(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("statusCode").map(|c| c.to_string().trim_matches('"') == "409"))
        .unwrap_or(false)
}

#[async_trait]
impl StorageBackend for SupabaseBackend {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn store(&self, upload: StagedUpload<'_>) -> StorageResult<StoredObject> {
        let content_type = upload.content_type_or_guess();
        let file = tokio::fs::File::open(upload.path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .authorized(self.client.post(self.object_url(upload.name)))
            .header(header::CONTENT_TYPE, &content_type)
            .header(header::CONTENT_LENGTH, upload.size_bytes)
            .header("x-upsert", "false")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.is_server_error() {
                return Err(StorageError::Unavailable(error_message(response).await));
            }
            let body = response.text().await.unwrap_or_default();
            if is_duplicate(status, &body) {
                tracing::warn!("Upload collides with existing object: {}", upload.name);
                return Err(StorageError::AlreadyExists(upload.name.to_string()));
            }
            return Err(StorageError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        tracing::info!("Uploaded {} to Supabase bucket {}", upload.name, self.bucket);

        Ok(StoredObject {
            name: upload.name.to_string(),
            storage_ref: self.public_url(upload.name),
            storage_id: parsed.id.or(parsed.key),
            content_type: Some(content_type),
            size_bytes: Some(upload.size_bytes),
        })
    }

    async fn delete(&self, object: &StoredObject) -> StorageResult<()> {
        let response = self
            .authorized(self.client.delete(self.object_url(&object.name)))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            tracing::info!("Removed {} from Supabase bucket {}", object.name, self.bucket);
            return Ok(());
        }

        let message = error_message(response).await;
        Err(if status.is_server_error() {
            StorageError::Unavailable(message)
        } else {
            StorageError::Rejected(message)
        })
    }

    async fn list(&self) -> StorageResult<Vec<StoredObject>> {
        let listed = collect_pages(BACKEND_LIST_LIMIT, |offset| self.list_page(offset)).await?;

        Ok(listed
            .into_iter()
            .filter_map(|o| self.listed_into_object(o))
            .collect())
    }
}
