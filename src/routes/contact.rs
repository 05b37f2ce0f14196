use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::constants::MSG_CONTACT_RECEIVED;
use crate::error::AppError;
use crate::models::ContactMessage;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub status: &'static str,
    pub message: String,
}

impl ContactResponse {
    fn failure(status: StatusCode, message: String) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status: "error",
                message,
            }),
        )
    }

    fn error(err: AppError) -> (StatusCode, Json<Self>) {
        let (status, message) = err.status_and_message();
        Self::failure(status, message)
    }

    /// Malformed bodies and wrong content types keep the JSON error shape
    fn rejected(rejection: JsonRejection) -> (StatusCode, Json<Self>) {
        tracing::debug!("Rejected contact body: {}", rejection.body_text());
        Self::failure(rejection.status(), rejection.body_text())
    }
}

/// Append a contact-form submission to the message log
///
/// POST /api/contact
pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ContactResponse>, (StatusCode, Json<ContactResponse>)> {
    let Json(payload) = payload.map_err(ContactResponse::rejected)?;
    let Value::Object(fields) = payload else {
        return Err(ContactResponse::error(AppError::InvalidInput(
            "Expected a JSON object".to_string(),
        )));
    };

    state
        .messages
        .append(ContactMessage::new(fields, Utc::now()))
        .await
        .map_err(ContactResponse::error)?;

    tracing::info!("Contact message received");

    Ok(Json(ContactResponse {
        status: "success",
        message: MSG_CONTACT_RECEIVED.to_string(),
    }))
}
