use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::constants::SESSION_COOKIE_NAME;
use crate::error::{AppError, Result};
use crate::security::verify_signed_token;
use crate::AppState;

/// The logged-in user, placed in request extensions by `require_session`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub token: String,
}

/// Session token from the signed cookie, if present and correctly signed
pub fn session_token(state: &AppState, jar: &CookieJar) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE_NAME)?;
    verify_signed_token(cookie.value(), &state.config.session_secret).map(str::to_string)
}

/// Resolve the request's session to a user
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Result<Option<CurrentUser>> {
    let Some(token) = session_token(state, jar) else {
        return Ok(None);
    };

    Ok(state
        .sessions
        .resolve(&token)
        .await?
        .map(|username| CurrentUser { username, token }))
}

/// Authentication gate for protected routes
///
/// Anonymous requests are redirected to `/login` before the handler runs.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    match current_user(&state, &jar).await? {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => {
            tracing::debug!("Unauthenticated request to {}", req.uri().path());
            Err(AppError::Unauthenticated)
        }
    }
}
