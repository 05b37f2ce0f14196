use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Extension,
};
use tokio_util::io::ReaderStream;

use super::gate::CurrentUser;
use crate::error::{AppError, Result};
use crate::html;
use crate::security::sanitize_filename;
use crate::AppState;

/// List every uploaded file with its retrieval link
///
/// GET /downloads
pub async fn list_uploads(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>> {
    let records = state.uploads.list().await?;
    Ok(html::downloads_page(&user.username, &records))
}

/// Serve a file stored by the local backend
///
/// GET /uploads/:filename
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let root = state.backend.local_root().ok_or(AppError::FileNotFound)?;

    // Only bare names that the upload handler could have produced
    match sanitize_filename(&filename) {
        Some(name) if name == filename => {}
        _ => {
            tracing::warn!("Rejected download path: {:?}", filename);
            return Err(AppError::FileNotFound);
        }
    }

    let path = root.join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::FileNotFound),
        Err(e) => return Err(e.into()),
    };
    if !file.metadata().await?.is_file() {
        return Err(AppError::FileNotFound);
    }

    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
