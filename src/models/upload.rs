use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one successfully stored file
///
/// Records are append-only: once written to the index they are never changed.
/// Everything after `storage_id` is optional so that index files written
/// before those fields existed still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// Filename as given by the uploader, used as the display name
    pub original_name: String,
    /// URL or path the file can be fetched from
    pub storage_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    pub fn new(
        original_name: impl Into<String>,
        storage_ref: impl Into<String>,
        storage_id: Option<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            storage_ref: storage_ref.into(),
            storage_id,
            content_type: None,
            size_bytes: None,
            uploaded_by: None,
            uploaded_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_loads() {
        let json = r#"{"originalName":"a.txt","storageRef":"/uploads/a.txt"}"#;
        let record: UploadRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.original_name, "a.txt");
        assert_eq!(record.storage_ref, "/uploads/a.txt");
        assert!(record.storage_id.is_none());
        assert!(record.uploaded_at.is_none());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let record = UploadRecord::new("a.txt", "/uploads/a.txt", None);
        let json = serde_json::to_value(&record).unwrap();

        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("originalName"));
        assert!(obj.contains_key("storageRef"));
    }
}
