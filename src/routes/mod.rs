pub mod auth;
pub mod contact;
pub mod downloads;
pub mod gate;
pub mod health;
pub mod upload;

pub use auth::{login, logout, signup};
pub use contact::submit_contact;
pub use downloads::{list_uploads, serve_upload};
pub use gate::{require_session, CurrentUser};
pub use health::health_check;
pub use upload::upload_file;

use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    middleware,
    response::Redirect,
    routing::{get, get_service, post, MethodRouter},
    Router,
};
use std::path::Path;
use std::time::Duration;
use tower_http::{
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::AppState;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn page(public_dir: &Path, file: &str) -> MethodRouter<AppState> {
    get_service(ServeFile::new(public_dir.join(file)))
}

async fn redirect_home() -> Redirect {
    Redirect::to("/")
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();

    let protected = Router::new()
        .route("/logout", get(logout))
        .route("/upload", page(&public_dir, "upload.html").post(upload_file))
        .route("/downloads", get(list_uploads))
        .route("/uploads/:filename", get(serve_upload))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let public = Router::new()
        .route("/", page(&public_dir, "index.html"))
        .route("/about", page(&public_dir, "about.html"))
        .route("/contact", page(&public_dir, "contact.html"))
        .route("/api/contact", post(submit_contact))
        .route("/login", page(&public_dir, "login.html").post(login))
        .route("/signup", page(&public_dir, "signup.html").post(signup))
        .route("/health", get(health_check));

    // Assets (css, js) are served from the public dir; anything else goes home
    let assets = ServeDir::new(&public_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(redirect_home.into_service());

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback_service(assets)
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
