use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A contact-form submission as appended to the message log
///
/// The form's fields are kept as-is; only the receive time is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl ContactMessage {
    pub fn new(fields: Map<String, Value>, received_at: DateTime<Utc>) -> Self {
        Self {
            fields,
            received_at: Some(received_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_are_flattened() {
        let fields = json!({ "name": "Ada", "message": "hi" })
            .as_object()
            .cloned()
            .unwrap();
        let msg = ContactMessage::new(fields, Utc::now());

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["name"], "Ada");
        assert_eq!(value["message"], "hi");
        assert!(value["receivedAt"].is_string());
    }
}
