use crate::AppState;
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

const DEFAULT_ROBOTS: &str = r#"# robots.txt for the photo gallery

User-agent: *
Allow: /
Disallow: /upload/
Disallow: /login/
Disallow: /logout/
"#;

/// Handler for /robots.txt. A `robots.txt` in the static directory wins over
/// the built-in rules.
pub async fn robots_txt_handler(State(app_state): State<AppState>) -> Response {
    let custom_robots_path = app_state.config.static_files.directory.join("robots.txt");

    if tokio::fs::try_exists(&custom_robots_path)
        .await
        .unwrap_or(false)
    {
        match tokio::fs::read_to_string(&custom_robots_path).await {
            Ok(content) => {
                return (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    content,
                )
                    .into_response();
            }
            Err(e) => {
                tracing::error!("Failed to read custom robots.txt: {}", e);
            }
        }
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        DEFAULT_ROBOTS,
    )
        .into_response()
}
