use serde::{Deserialize, Serialize};

/// Session record: binds an opaque token to a username until it expires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub username: String,
    /// Unix timestamp of login
    pub created_at: i64,
    /// Unix timestamp after which the session is dead
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn new(token: String, username: String, now: i64, ttl_secs: u64) -> Self {
        Self {
            token,
            username,
            created_at: now,
            expires_at: now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
