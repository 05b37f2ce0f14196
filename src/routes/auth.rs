use axum::{
    extract::State,
    response::Redirect,
    Extension, Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use super::gate::CurrentUser;
use crate::constants::SESSION_COOKIE_NAME;
use crate::error::Result;
use crate::security::sign_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

fn session_cookie(state: &AppState, token: &str) -> Result<Cookie<'static>> {
    let value = sign_token(token, &state.config.session_secret)?;
    let max_age = i64::try_from(state.sessions.ttl_secs()).unwrap_or(i64::MAX);

    Ok(Cookie::build((SESSION_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .secure(state.config.environment == "production")
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age))
        .build())
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME).path("/").build()
}

/// Create an account, then send the user to the login page
///
/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect> {
    let username = form.username.trim();
    state.credentials.register(username, &form.password).await?;

    Ok(Redirect::to("/login"))
}

/// Check credentials, start a session and set the session cookie
///
/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Redirect)> {
    let user = state
        .credentials
        .authenticate(form.username.trim(), &form.password)
        .await?;

    let token = state.sessions.create(&user.username).await?;
    let jar = jar.add(session_cookie(&state, &token)?);

    tracing::info!("User {} logged in", user.username);
    Ok((jar, Redirect::to("/downloads")))
}

/// End the session and clear the cookie
///
/// GET /logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    state.sessions.destroy(&user.token).await?;

    tracing::info!("User {} logged out", user.username);
    Ok((jar.remove(removal_cookie()), Redirect::to("/")))
}
