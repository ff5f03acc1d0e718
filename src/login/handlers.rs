use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    AppState,
    api::{cookie_header, create_signed_cookie, expired_cookie_header},
};

use super::{
    AUTH_COOKIE, LoginError, SESSION_MAX_AGE_SECS, get_authenticated_user, normalize_username,
    safe_next,
};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

async fn render_login(
    app_state: &AppState,
    next: &str,
    username: &str,
    error: Option<&str>,
    current_user: Option<String>,
) -> Result<Html<String>, StatusCode> {
    let globals = liquid::object!({
        "site_name": app_state.config.app.name,
        "base_url": app_state.config.app.base_url.as_deref().unwrap_or(""),
        "next": next,
        "username": username,
        "error": error,
        "current_user": current_user,
    });

    app_state
        .template_engine
        .render_page("login.html.liquid", globals)
        .await
}

pub async fn login_page(
    State(app_state): State<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_authenticated_user(&headers, &app_state.config.app.session_secret);
    let next = safe_next(query.next.as_deref());
    render_login(&app_state, &next, "", None, current_user).await
}

pub async fn login_submit(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, LoginError> {
    let username = normalize_username(&form.username);
    let next = safe_next(form.next.as_deref());

    let authenticated = app_state
        .users
        .read()
        .await
        .authenticate(&username, &form.password)
        .is_some();

    if !authenticated {
        warn!(user = %username, "Failed login attempt");
        let page = render_login(
            &app_state,
            &next,
            &username,
            Some("Invalid username or password"),
            None,
        )
        .await
        .map_err(|status| LoginError::InternalError(status.to_string()))?;
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    }

    let signed_value =
        create_signed_cookie(&app_state.config.app.session_secret, AUTH_COOKIE, &username)
            .map_err(LoginError::InternalError)?;
    let cookie = cookie_header(AUTH_COOKIE, &signed_value, SESSION_MAX_AGE_SECS)
        .ok_or_else(|| LoginError::InternalError("invalid session cookie".to_string()))?;

    info!(user = %username, "User logged in");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Redirect::to(&next)).into_response())
}

pub async fn logout() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, expired_cookie_header(AUTH_COOKIE));

    (headers, Redirect::to("/"))
}
