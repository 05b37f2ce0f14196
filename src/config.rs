use std::env;
use std::path::PathBuf;

use crate::constants::{DEV_SESSION_SECRET, MAX_SESSION_TTL_SECS};

/// Which session store backs the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Memory,
    File,
}

/// Which upload index keeps the list of uploaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadIndexKind {
    Memory,
    Json,
    /// Reconstructed live from the storage backend on every listing
    Backend,
}

/// Storage backend selection plus its credentials
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local,
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
    Supabase {
        url: String,
        key: String,
        bucket: String,
    },
}

impl StorageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StorageConfig::Local => "local",
            StorageConfig::Cloudinary { .. } => "cloudinary",
            StorageConfig::Supabase { .. } => "supabase",
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub public_dir: PathBuf,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub upload_index: UploadIndexKind,
    pub upload_index_path: PathBuf,
    pub messages_path: PathBuf,
    pub session_store: SessionStoreKind,
    pub session_secret: String,
    pub session_ttl_secs: u64,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| "Invalid PORT")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let public_dir = env_path("PUBLIC_DIR", "public");
        let data_dir = env_path("DATA_DIR", "data");
        let uploads_dir = env_path("UPLOADS_DIR", "uploads");
        let upload_index_path = env_path("UPLOAD_INDEX_PATH", "uploads.json");
        let messages_path = env_path("MESSAGES_PATH", "messages.json");

        let session_store = match env::var("SESSION_STORE")
            .unwrap_or_else(|_| "file".to_string())
            .as_str()
        {
            "file" => SessionStoreKind::File,
            "memory" => SessionStoreKind::Memory,
            other => return Err(format!("Invalid SESSION_STORE: {}", other)),
        };

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "production" => {
                return Err("SESSION_SECRET must be set in production".to_string())
            }
            _ => {
                tracing::warn!("SESSION_SECRET not set, using development secret");
                DEV_SESSION_SECRET.to_string()
            }
        };

        let session_ttl_secs = parse_session_ttl(
            &env::var("SESSION_TTL_SECS").unwrap_or_else(|_| "86400".to_string()),
        )?;

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "local" => StorageConfig::Local,
            "cloudinary" => StorageConfig::Cloudinary {
                cloud_name: required("CLOUD_NAME")?,
                api_key: required("CLOUD_API_KEY")?,
                api_secret: required("CLOUD_API_SECRET")?,
            },
            "supabase" => StorageConfig::Supabase {
                url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
                key: required("SUPABASE_KEY")?,
                bucket: required("SUPABASE_BUCKET")?,
            },
            other => return Err(format!("Invalid STORAGE_BACKEND: {}", other)),
        };

        let upload_index = match env::var("UPLOAD_INDEX")
            .unwrap_or_else(|_| "json".to_string())
            .as_str()
        {
            "json" => UploadIndexKind::Json,
            "memory" => UploadIndexKind::Memory,
            "backend" => UploadIndexKind::Backend,
            other => return Err(format!("Invalid UPLOAD_INDEX: {}", other)),
        };

        if upload_index == UploadIndexKind::Backend
            && matches!(storage, StorageConfig::Cloudinary { .. })
        {
            return Err("UPLOAD_INDEX=backend is not supported with cloudinary storage".to_string());
        }

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "52428800".to_string())
            .parse()
            .map_err(|_| "Invalid MAX_UPLOAD_BYTES")?;

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| "Invalid REQUEST_TIMEOUT_SECS")?;

        Ok(Config {
            server_host,
            server_port,
            environment,
            public_dir,
            data_dir,
            uploads_dir,
            upload_index,
            upload_index_path,
            messages_path,
            session_store,
            session_secret,
            session_ttl_secs,
            storage,
            max_upload_bytes,
            request_timeout_secs,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Staging area for in-flight uploads
    pub fn staging_dir(&self) -> PathBuf {
        self.uploads_dir.join(".staging")
    }
}

/// Session lifetime in seconds, bounded so expiry timestamps never overflow
fn parse_session_ttl(raw: &str) -> Result<u64, String> {
    let ttl: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("Invalid SESSION_TTL_SECS: {}", raw))?;
    if ttl > MAX_SESSION_TTL_SECS {
        return Err(format!(
            "SESSION_TTL_SECS must be at most {} (got {})",
            MAX_SESSION_TTL_SECS, ttl
        ));
    }
    Ok(ttl)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn required(key: &str) -> Result<String, String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{} must be set for the selected storage backend", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_ttl() {
        assert_eq!(parse_session_ttl("86400"), Ok(86400));
        assert_eq!(parse_session_ttl("0"), Ok(0));
        assert_eq!(
            parse_session_ttl(&MAX_SESSION_TTL_SECS.to_string()),
            Ok(MAX_SESSION_TTL_SECS)
        );
    }

    #[test]
    fn test_parse_session_ttl_rejects_out_of_range() {
        assert!(parse_session_ttl(&(MAX_SESSION_TTL_SECS + 1).to_string()).is_err());
        assert!(parse_session_ttl("18446744073709551615").is_err());
        assert!(parse_session_ttl("-1").is_err());
        assert!(parse_session_ttl("soon").is_err());
    }
}
