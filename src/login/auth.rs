use crate::{
    AppState,
    api::{get_cookie_value, verified_value},
};
use axum::{
    http::{HeaderMap, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

pub const AUTH_COOKIE: &str = "auth";
/// Login session lifetime: 14 days.
pub const SESSION_MAX_AGE_SECS: u64 = 14 * 24 * 60 * 60;

/// Check if the user is authenticated and return their username
pub fn get_authenticated_user(headers: &HeaderMap, secret: &str) -> Option<String> {
    let signed_value = get_cookie_value(headers, AUTH_COOKIE)?;
    verified_value(secret, AUTH_COOKIE, &signed_value).map(str::to_string)
}

/// The logged-in user's name if they exist and are staff.
pub async fn staff_user(app_state: &AppState, headers: &HeaderMap) -> Option<String> {
    let username = get_authenticated_user(headers, &app_state.config.app.session_secret)?;
    let users = app_state.users.read().await;
    users.is_staff(&username).then_some(username)
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// `302` to the login page, returning to `next` afterwards.
pub fn login_redirect(next: &str) -> Response {
    let next = urlencoding::encode(next).replace("%2F", "/");
    (
        StatusCode::FOUND,
        [(LOCATION, format!("/login/?next={}", next))],
    )
        .into_response()
}
