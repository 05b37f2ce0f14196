use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use super::json_file::write_json;
use crate::error::Result;
use crate::models::SessionRecord;
use crate::security::{generate_token, is_well_formed_token};

/// Where session records live
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn insert(&self, record: SessionRecord) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Remove a session; removing an unknown token is not an error
    async fn remove(&self, token: &str) -> Result<()>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(record.token.clone(), record);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// One JSON file per session: `<dir>/<token>.json`
///
/// Sessions survive restarts. Only well-formed tokens ever reach the
/// filesystem.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, token: &str) -> Option<PathBuf> {
        is_well_formed_token(token).then(|| self.dir.join(format!("{}.json", token)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<()> {
        let Some(path) = self.path_for(&record.token) else {
            return Err(crate::error::AppError::InvalidInput(
                "Malformed session token".to_string(),
            ));
        };
        write_json(&path, &record).await
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>> {
        let Some(path) = self.path_for(token) else {
            return Ok(None);
        };

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<SessionRecord>(&bytes) {
            Ok(record) if record.token == token => Ok(Some(record)),
            Ok(_) | Err(_) => {
                // An unreadable session just logs the user out
                tracing::warn!("Discarding unreadable session file {}", path.display());
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn remove(&self, token: &str) -> Result<()> {
        let Some(path) = self.path_for(token) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Session manager
// =============================================================================

/// Issues, resolves and destroys login sessions on top of a `SessionStore`
///
/// Expiry is lazy: an expired session is removed the next time it is resolved.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl_secs: u64,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Start a session for `username` and return its token
    pub async fn create(&self, username: &str) -> Result<String> {
        let token = generate_token();
        let record = SessionRecord::new(
            token.clone(),
            username.to_string(),
            Utc::now().timestamp(),
            self.ttl_secs,
        );
        self.store.insert(record).await?;

        tracing::info!("Session created for {}", username);
        Ok(token)
    }

    /// Username bound to `token`, or `None` if unknown or expired
    pub async fn resolve(&self, token: &str) -> Result<Option<String>> {
        self.resolve_at(token, Utc::now().timestamp()).await
    }

    async fn resolve_at(&self, token: &str, now: i64) -> Result<Option<String>> {
        let Some(record) = self.store.get(token).await? else {
            return Ok(None);
        };

        if record.is_expired(now) {
            tracing::debug!("Session for {} expired", record.username);
            self.store.remove(token).await?;
            return Ok(None);
        }

        Ok(Some(record.username))
    }

    /// End a session; destroying an unknown token is fine
    pub async fn destroy(&self, token: &str) -> Result<()> {
        self.store.remove(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn managers(dir: &TempDir) -> Vec<SessionManager> {
        vec![
            SessionManager::new(Arc::new(MemorySessionStore::new()), 3600),
            SessionManager::new(Arc::new(FileSessionStore::new(dir.path().join("sessions"))), 3600),
        ]
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let dir = TempDir::new().unwrap();
        for manager in managers(&dir) {
            let token = manager.create("alice").await.unwrap();
            assert_eq!(manager.resolve(&token).await.unwrap().as_deref(), Some("alice"));
        }
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        for manager in managers(&dir) {
            assert_eq!(manager.resolve(&generate_token()).await.unwrap(), None);
            assert_eq!(manager.resolve("../../etc/passwd").await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let dir = TempDir::new().unwrap();
        for manager in managers(&dir) {
            let token = manager.create("alice").await.unwrap();

            manager.destroy(&token).await.unwrap();
            manager.destroy(&token).await.unwrap();

            assert_eq!(manager.resolve(&token).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_access() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStore::new(dir.path().join("sessions")));
        let manager = SessionManager::new(store.clone(), 60);

        let token = manager.create("alice").await.unwrap();
        let later = Utc::now().timestamp() + 61;

        assert_eq!(manager.resolve_at(&token, later).await.unwrap(), None);
        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_sessions_survive_new_store_instance() {
        let dir = TempDir::new().unwrap();
        let sessions_dir = dir.path().join("sessions");

        let token = SessionManager::new(Arc::new(FileSessionStore::new(&sessions_dir)), 3600)
            .create("alice")
            .await
            .unwrap();

        let reopened = SessionManager::new(Arc::new(FileSessionStore::new(&sessions_dir)), 3600);
        assert_eq!(reopened.resolve(&token).await.unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_corrupt_session_file_logs_out() {
        let dir = TempDir::new().unwrap();
        let sessions_dir = dir.path().join("sessions");
        let store = FileSessionStore::new(&sessions_dir);

        let token = generate_token();
        std::fs::create_dir_all(&sessions_dir).unwrap();
        std::fs::write(sessions_dir.join(format!("{}.json", token)), "garbage").unwrap();

        assert!(store.get(&token).await.unwrap().is_none());
        assert!(!sessions_dir.join(format!("{}.json", token)).exists());
    }

    #[tokio::test]
    async fn test_tokens_are_unique_per_login() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), 3600);
        let a = manager.create("alice").await.unwrap();
        let b = manager.create("alice").await.unwrap();

        assert_ne!(a, b);
        manager.destroy(&a).await.unwrap();
        assert_eq!(manager.resolve(&b).await.unwrap().as_deref(), Some("alice"));
    }
}
