use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::json_file::{read_json, write_json};
use crate::error::{AppError, Result};
use crate::models::{User, UserRecord};
use crate::security::{dummy_verify, hash_password, verify_password};

/// Username -> credential mapping as persisted in users.json
pub type Credentials = BTreeMap<String, UserRecord>;

/// File-backed credential store
///
/// State is re-read from disk on every operation, so a corrupt file only fails
/// the requests that touch it. Writers are serialized by `write_lock`.
pub struct CredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted credentials; empty if nothing has been saved yet
    pub async fn load(&self) -> Result<Credentials> {
        read_json(&self.path).await
    }

    /// Overwrite persisted credentials with `credentials`
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        write_json(&self.path, credentials).await
    }

    /// Create a new account
    ///
    /// Fails with `UsernameTaken` if the username exists. The password is hashed
    /// off the async runtime before the write lock is taken, and the existence
    /// check is repeated under the lock.
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        if !User::validate_username(username) {
            return Err(AppError::InvalidInput(
                "Username must be 1-64 letters, digits, '.', '_' or '-'".to_string(),
            ));
        }
        if !User::validate_password(password) {
            return Err(AppError::InvalidInput(
                "Password must be 1-1024 bytes".to_string(),
            ));
        }

        if self.load().await?.contains_key(username) {
            return Err(AppError::UsernameTaken);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let _guard = self.write_lock.lock().await;
        let mut credentials = self.load().await?;
        if credentials.contains_key(username) {
            return Err(AppError::UsernameTaken);
        }

        credentials.insert(
            username.to_string(),
            UserRecord {
                username: username.to_string(),
                password_hash,
            },
        );
        self.save(&credentials).await?;

        tracing::info!("New user registered: {}", username);
        Ok(())
    }

    /// Check a username/password pair
    ///
    /// Unknown usernames and wrong passwords both return `InvalidCredentials`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let stored_hash = self
            .load()
            .await?
            .remove(username)
            .map(|record| record.password_hash);

        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verify_password(&password, &hash),
            None => {
                dummy_verify(&password);
                false
            }
        })
        .await?;

        if verified {
            Ok(User {
                username: username.to_string(),
            })
        } else {
            tracing::info!("Failed login attempt");
            Err(AppError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("data").join("users.json"))
    }

    #[tokio::test]
    async fn test_load_without_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.register("alice", "s3cret").await.unwrap();
        let user = store.authenticate("alice", "s3cret").await.unwrap();

        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.register("alice", "one").await.unwrap();
        let result = store.register("alice", "two").await;

        assert!(matches!(result, Err(AppError::UsernameTaken)));
        // Original password still works
        assert!(store.authenticate("alice", "one").await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.register("alice", "right").await.unwrap();

        let wrong = store.authenticate("alice", "wrong").await.unwrap_err();
        let unknown = store.authenticate("mallory", "right").await.unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.register("alice", "plaintext-pw").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("plaintext-pw"));
        assert!(raw.contains("$argon2id$"));
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        store(&dir).register("alice", "pw").await.unwrap();

        let reopened = store(&dir);
        assert!(reopened.authenticate("alice", "pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_username_rejected() {
        let dir = TempDir::new().unwrap();
        let result = store(&dir).register("../evil", "pw").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_request() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "[[[").unwrap();

        assert!(matches!(
            store.authenticate("alice", "pw").await,
            Err(AppError::CorruptState(_))
        ));
        assert!(matches!(
            store.register("alice", "pw").await,
            Err(AppError::CorruptState(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_all_persist() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store(&dir));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.register(&format!("user{}", i), "pw").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 4);
    }
}
