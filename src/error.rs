use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::constants::{ERR_INVALID_CREDENTIALS, ERR_USERNAME_TAKEN};
use crate::html;
use crate::storage::StorageError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Session signing error: {0}")]
    Signing(#[from] hmac::digest::InvalidLength),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Corrupt state in {0}")]
    CorruptState(String),

    #[error("User already exists")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found")]
    FileNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload too large")]
    PayloadTooLarge,
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => AppError::BackendUnavailable(msg),
            other => AppError::UploadFailed(other.to_string()),
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::PasswordHash(err.to_string())
    }
}

impl AppError {
    /// Status code and user-facing message for this error
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                internal()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {:?}", e);
                internal()
            }
            AppError::TaskJoin(e) => {
                tracing::error!("Task join error: {:?}", e);
                internal()
            }
            AppError::PasswordHash(e) => {
                tracing::error!("Password hash error: {}", e);
                internal()
            }
            AppError::Signing(e) => {
                tracing::error!("Session signing error: {}", e);
                internal()
            }
            AppError::CorruptState(what) => {
                tracing::error!("Corrupt state file: {}", what);
                internal()
            }
            AppError::Multipart(e) => (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)),
            AppError::UsernameTaken => (StatusCode::CONFLICT, ERR_USERNAME_TAKEN.to_string()),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string())
            }
            AppError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Please log in first".to_string())
            }
            // Backend messages are shown verbatim
            AppError::BackendUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Storage backend unavailable: {}", msg),
            ),
            AppError::UploadFailed(msg) => {
                (StatusCode::BAD_GATEWAY, format!("Upload failed: {}", msg))
            }
            AppError::FileNotFound => (StatusCode::NOT_FOUND, "File not found".to_string()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File exceeds the maximum upload size".to_string(),
            ),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Implement IntoResponse to render AppError as an HTML page
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Unauthenticated) {
            return Redirect::to("/login").into_response();
        }

        let (status, message) = self.status_and_message();
        let page = match self {
            AppError::UsernameTaken => html::retry_page("Sign up", &message, "/signup"),
            AppError::InvalidCredentials => html::retry_page("Log in", &message, "/login"),
            AppError::UploadFailed(_) | AppError::PayloadTooLarge | AppError::Multipart(_) => {
                html::retry_page("Upload", &message, "/upload")
            }
            _ => html::error_page(status, &message),
        };

        (status, page).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
