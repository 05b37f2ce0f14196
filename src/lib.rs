//! File Drop Server Library
//!
//! A small website with session login and file uploads. Uploaded files go to a
//! pluggable storage backend (local disk, Cloudinary or Supabase) and are
//! listed from a pluggable upload index.

pub mod config;
pub mod constants;
pub mod error;
pub mod html;
pub mod models;
pub mod routes;
pub mod security;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::router;

use std::sync::Arc;

use storage::{build_backend, StorageBackend, StorageResult};
use store::{
    build_sessions, build_upload_index, CredentialStore, MessageLog, SessionManager, UploadIndex,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub sessions: SessionManager,
    pub uploads: Arc<dyn UploadIndex>,
    pub backend: Arc<dyn StorageBackend>,
    pub messages: Arc<MessageLog>,
}

impl AppState {
    /// Wire up every store and the storage backend from configuration
    pub fn from_config(config: Config) -> StorageResult<Self> {
        let backend = build_backend(&config.storage, config.uploads_dir.clone())?;
        Ok(Self::with_backend(config, backend))
    }

    /// Like `from_config`, with an already-built storage backend
    pub fn with_backend(config: Config, backend: Arc<dyn StorageBackend>) -> Self {
        let credentials = Arc::new(CredentialStore::new(config.users_path()));
        let sessions = build_sessions(&config);
        let uploads = build_upload_index(&config, backend.clone());
        let messages = Arc::new(MessageLog::new(&config.messages_path));

        Self {
            config,
            credentials,
            sessions,
            uploads,
            backend,
            messages,
        }
    }
}
