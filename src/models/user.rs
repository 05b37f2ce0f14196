use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PASSWORD_LEN, MAX_USERNAME_LEN};

/// User record stored in users.json, keyed by username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    /// Argon2id PHC string (salt embedded)
    pub password_hash: String,
}

/// Proof of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

impl User {
    /// Usernames are 1-64 characters of `[A-Za-z0-9_.-]`
    pub fn validate_username(username: &str) -> bool {
        !username.is_empty()
            && username.chars().count() <= MAX_USERNAME_LEN
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    }

    pub fn validate_password(password: &str) -> bool {
        !password.is_empty() && password.len() <= MAX_PASSWORD_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("alice"));
        assert!(User::validate_username("bob.smith-2_x"));

        // Empty
        assert!(!User::validate_username(""));

        // Too long
        assert!(!User::validate_username(&"a".repeat(65)));
        assert!(User::validate_username(&"a".repeat(64)));

        // Invalid characters
        assert!(!User::validate_username("alice smith"));
        assert!(!User::validate_username("../etc"));
        assert!(!User::validate_username("<b>"));
    }

    #[test]
    fn test_validate_password() {
        assert!(User::validate_password("hunter2"));
        assert!(!User::validate_password(""));
        assert!(!User::validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1)));
    }

    #[test]
    fn test_user_record_uses_camel_case() {
        let record = UserRecord {
            username: "alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["passwordHash"], "$argon2id$...");

        let back: UserRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
