use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint
///
/// Reports whether the credential store is readable and which storage backend
/// is in use. Used by load balancers and monitoring systems.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let store_status = match state.credentials.load().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!("Credential store health check failed: {}", e);
            "unreadable"
        }
    };

    Json(json!({
        "status": if store_status == "ok" { "healthy" } else { "unhealthy" },
        "store": store_status,
        "storage": state.backend.name(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
