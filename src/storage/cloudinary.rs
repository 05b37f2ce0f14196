//! Cloudinary upload API backend.
//!
//! Uploads are signed requests to `/{cloud}/{resource_type}/upload`. The full
//! sanitized filename, extension included, is sent as the public id, and
//! `overwrite=false` so a second upload with the same name is reported back as
//! `existing` instead of replacing the first.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio_util::io::ReaderStream;

use super::{error_message, StagedUpload, StorageBackend, StorageError, StorageResult, StoredObject};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct CloudinaryBackend {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    existing: bool,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryBackend {
    pub fn new(
        client: reqwest::Client,
        cloud_name: String,
        api_key: String,
        api_secret: String,
    ) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// Point the backend at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn upload_url(&self, resource_type: &str) -> String {
        format!("{}/{}/{}/upload", self.api_base, self.cloud_name, resource_type)
    }

    fn destroy_url(&self, resource_type: &str) -> String {
        format!("{}/{}/{}/destroy", self.api_base, self.cloud_name, resource_type)
    }

    /// Parameters that take part in the upload signature
    fn signed_params(timestamp: i64, public_id: &str) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("overwrite", "false".to_string());
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.to_string());
        params
    }

    fn into_object(response: UploadResponse, upload: &StagedUpload<'_>) -> StoredObject {
        let content_type = match (response.resource_type.as_deref(), response.format.as_deref()) {
            (Some(kind), Some(format)) if kind != "raw" => Some(format!("{}/{}", kind, format)),
            _ => upload.content_type.map(str::to_string),
        };

        StoredObject {
            name: upload.name.to_string(),
            storage_ref: response.secure_url,
            storage_id: Some(response.public_id),
            content_type,
            size_bytes: response.bytes.or(Some(upload.size_bytes)),
        }
    }
}

/// Public id for a stored filename
///
/// The extension stays part of the id, so `report.pdf` and `report.png` are
/// different objects. Characters Cloudinary reserves in public ids become `_`.
pub fn public_id_for(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '?' | '&' | '#' | '\\' | '%' | '<' | '>' => '_',
            c => c,
        })
        .collect()
}

/// Resource type segment of a delivery URL (`.../{cloud}/{type}/upload/...`)
fn resource_type_of(url: &str) -> &str {
    let segments: Vec<&str> = url.split('/').collect();
    segments
        .iter()
        .position(|s| *s == "upload")
        .and_then(|i| i.checked_sub(1))
        .map(|i| segments[i])
        .filter(|t| matches!(*t, "image" | "video" | "raw"))
        .unwrap_or("image")
}

/// Cloudinary request signature
///
/// `sha256("k1=v1&k2=v2..." + api_secret)` over the signed parameters sorted by
/// key, hex-encoded. Sent together with `signature_algorithm=sha256`.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl StorageBackend for CloudinaryBackend {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn store(&self, upload: StagedUpload<'_>) -> StorageResult<StoredObject> {
        let public_id = public_id_for(upload.name);
        let params = Self::signed_params(chrono::Utc::now().timestamp(), &public_id);
        let signature = sign_params(&params, &self.api_secret);

        let file = tokio::fs::File::open(upload.path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, upload.size_bytes)
            .file_name(upload.name.to_string())
            .mime_str(&upload.content_type_or_guess())
            .map_err(|e| StorageError::Rejected(format!("invalid content type: {}", e)))?;

        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.upload_url(upload.kind.as_str()))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            tracing::warn!("Cloudinary rejected upload of {}: {}", upload.name, message);
            return Err(if status.is_server_error() {
                StorageError::Unavailable(message)
            } else {
                StorageError::Rejected(message)
            });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if parsed.existing {
            return Err(StorageError::AlreadyExists(upload.name.to_string()));
        }

        tracing::info!("Uploaded {} to Cloudinary as {}", upload.name, parsed.public_id);
        Ok(Self::into_object(parsed, &upload))
    }

    async fn delete(&self, object: &StoredObject) -> StorageResult<()> {
        let public_id = object
            .storage_id
            .clone()
            .unwrap_or_else(|| public_id_for(&object.name));

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id);
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.api_secret);
        params.insert("api_key", self.api_key.clone());
        params.insert("signature", signature);
        params.insert("signature_algorithm", "sha256".to_string());

        let response = self
            .client
            .post(self.destroy_url(resource_type_of(&object.storage_ref)))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(if status.is_server_error() {
                StorageError::Unavailable(message)
            } else {
                StorageError::Rejected(message)
            });
        }

        let parsed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        match parsed.result.as_str() {
            "ok" | "not found" => {
                tracing::info!("Removed {} from Cloudinary", object.name);
                Ok(())
            }
            other => Err(StorageError::Rejected(format!("destroy returned {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ResourceKind;
    use std::path::Path;

    #[test]
    fn test_sign_params_sorted_and_salted() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());

        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"public_id=sample_image&timestamp=1315060510abcd");
            hex::encode(hasher.finalize())
        };

        assert_eq!(sign_params(&params, "abcd"), expected);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = CloudinaryBackend::signed_params(1_700_000_000, "a.txt");
        assert_ne!(sign_params(&params, "a"), sign_params(&params, "b"));
    }

    #[test]
    fn test_signed_params_forbid_overwrite() {
        let params = CloudinaryBackend::signed_params(1, "report.pdf");
        assert_eq!(params["overwrite"], "false");
        assert_eq!(params["public_id"], "report.pdf");
        assert!(!params.contains_key("use_filename"));
    }

    #[test]
    fn test_public_id_keeps_extension() {
        let pdf = CloudinaryBackend::signed_params(1, &public_id_for("report.pdf"));
        let png = CloudinaryBackend::signed_params(1, &public_id_for("report.png"));

        assert_eq!(pdf["public_id"], "report.pdf");
        assert_eq!(png["public_id"], "report.png");
        assert_ne!(sign_params(&pdf, "s"), sign_params(&png, "s"));
    }

    #[test]
    fn test_public_id_replaces_reserved_characters() {
        assert_eq!(public_id_for("a?b&c#d%e<f>.txt"), "a_b_c_d_e_f_.txt");
        assert_eq!(public_id_for("my report.pdf"), "my report.pdf");
    }

    #[test]
    fn test_resource_type_from_delivery_url() {
        assert_eq!(
            resource_type_of("https://res.cloudinary.com/demo/raw/upload/v1/notes.txt"),
            "raw"
        );
        assert_eq!(
            resource_type_of("https://res.cloudinary.com/demo/video/upload/v1/clip.mp4"),
            "video"
        );
        assert_eq!(resource_type_of("https://elsewhere.example/x"), "image");
    }

    #[test]
    fn test_destroy_url() {
        let backend = CloudinaryBackend::new(
            reqwest::Client::new(),
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
        );
        assert_eq!(
            backend.destroy_url("image"),
            "https://api.cloudinary.com/v1_1/demo/image/destroy"
        );
    }

    #[test]
    fn test_upload_url_uses_resource_kind() {
        let backend = CloudinaryBackend::new(
            reqwest::Client::new(),
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
        )
        .with_api_base("http://localhost:9999/v1_1/");

        assert_eq!(
            backend.upload_url(ResourceKind::Auto.as_str()),
            "http://localhost:9999/v1_1/demo/auto/upload"
        );
    }

    #[test]
    fn test_response_mapping() {
        let response: UploadResponse = serde_json::from_str(
            r#"{"public_id":"report.pdf",
                "secure_url":"https://res.cloudinary.com/demo/image/upload/report.pdf.pdf",
                "bytes":42,"resource_type":"image","format":"pdf"}"#,
        )
        .unwrap();
        assert!(!response.existing);

        let upload = StagedUpload {
            path: Path::new("/tmp/x"),
            name: "report.pdf",
            content_type: None,
            size_bytes: 42,
            kind: ResourceKind::Auto,
        };
        let object = CloudinaryBackend::into_object(response, &upload);

        assert_eq!(object.name, "report.pdf");
        assert_eq!(object.storage_id.as_deref(), Some("report.pdf"));
        assert_eq!(object.size_bytes, Some(42));
        assert!(object.storage_ref.starts_with("https://"));
    }

    #[test]
    fn test_existing_flag_parsed() {
        let response: UploadResponse = serde_json::from_str(
            r#"{"public_id":"a","secure_url":"https://x/a","existing":true}"#,
        )
        .unwrap();
        assert!(response.existing);
    }
}
