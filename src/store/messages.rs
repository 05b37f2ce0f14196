use std::path::PathBuf;
use tokio::sync::Mutex;

use super::json_file::{read_json, write_json};
use crate::error::Result;
use crate::models::ContactMessage;

/// Contact-form submissions, persisted as a JSON array
pub struct MessageLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MessageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, message: ContactMessage) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut messages: Vec<ContactMessage> = read_json(&self.path).await?;
        messages.push(message);
        write_json(&self.path, &messages).await
    }

    pub async fn all(&self) -> Result<Vec<ContactMessage>> {
        read_json(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let log = MessageLog::new(dir.path().join("messages.json"));

        for name in ["Ada", "Grace"] {
            let fields = json!({ "name": name }).as_object().cloned().unwrap();
            log.append(ContactMessage::new(fields, Utc::now())).await.unwrap();
        }

        let all = log.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].fields["name"], "Ada");
        assert_eq!(all[1].fields["name"], "Grace");
    }
}
