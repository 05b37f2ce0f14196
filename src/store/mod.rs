//! File-backed persistence: credentials, upload index, sessions, messages.
//!
//! All stores are plain JSON files rewritten whole. Each store serializes its
//! own writers; nothing coordinates writers across processes.

pub mod credentials;
pub mod json_file;
pub mod messages;
pub mod sessions;
pub mod uploads;

pub use credentials::{CredentialStore, Credentials};
pub use messages::MessageLog;
pub use sessions::{FileSessionStore, MemorySessionStore, SessionManager, SessionStore};
pub use uploads::{BackendUploadIndex, JsonUploadIndex, MemoryUploadIndex, UploadIndex};

use std::sync::Arc;

use crate::config::{Config, SessionStoreKind, UploadIndexKind};
use crate::storage::StorageBackend;

/// Session manager for the configured store kind
pub fn build_sessions(config: &Config) -> SessionManager {
    let store: Arc<dyn SessionStore> = match config.session_store {
        SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
        SessionStoreKind::File => Arc::new(FileSessionStore::new(config.sessions_dir())),
    };
    tracing::info!("Session store: {:?}", config.session_store);
    SessionManager::new(store, config.session_ttl_secs)
}

/// Upload index for the configured kind
pub fn build_upload_index(
    config: &Config,
    backend: Arc<dyn StorageBackend>,
) -> Arc<dyn UploadIndex> {
    tracing::info!("Upload index: {:?}", config.upload_index);
    match config.upload_index {
        UploadIndexKind::Memory => Arc::new(MemoryUploadIndex::new()),
        UploadIndexKind::Json => Arc::new(JsonUploadIndex::new(&config.upload_index_path)),
        UploadIndexKind::Backend => Arc::new(BackendUploadIndex::new(backend)),
    }
}
