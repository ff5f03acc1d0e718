use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT, SET_COOKIE},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use super::validation::ALLOWED_EXTENSIONS;
use super::{
    FeedQuery, FeedResponse, UploadErrorResponse, UploadSuccessResponse, UploadedFile,
};
use crate::{
    AppState,
    api::{FLASH_COOKIE, expired_cookie_header, flash_cookie_header, read_flash},
    login::{get_authenticated_user, login_redirect, staff_user},
};

const UPLOAD_PATH: &str = "/upload/";
const FILES_FIELD: &str = "files";
const REQUESTED_WITH: &str = "x-requested-with";
const XML_HTTP_REQUEST: &str = "XMLHttpRequest";
const ACCEPT_JSON: &str = "application/json";

/// Script-driven requests get JSON instead of pages.
pub fn is_programmatic(headers: &HeaderMap) -> bool {
    let requested_with = headers
        .get(REQUESTED_WITH)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == XML_HTTP_REQUEST);

    // Only when JSON is listed first; browsers list text/html first
    let prefers_json = headers
        .get(ACCEPT)
        .and_then(|h| h.to_str().ok())
        .and_then(|accept| accept.split(',').next())
        .and_then(|first| first.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(ACCEPT_JSON));

    requested_with || prefers_json
}

#[derive(Serialize)]
struct PhotoCard {
    url: String,
    full_url: String,
    title: String,
    alt_text: String,
}

pub async fn index_handler(
    State(app_state): State<AppState>,
    Query(query): Query<FeedQuery>,
    headers: HeaderMap,
) -> Response {
    let gallery = &app_state.gallery;
    let programmatic = is_programmatic(&headers);

    let Some(page) = gallery.feed(query.page.as_deref(), programmatic).await else {
        return Json(FeedResponse::empty()).into_response();
    };

    if programmatic {
        let photos = page
            .photos
            .iter()
            .map(|photo| gallery.feed_item(photo, false))
            .collect();
        return Json(FeedResponse {
            photos,
            has_next: page.has_next,
        })
        .into_response();
    }

    let secret = &app_state.config.app.session_secret;
    let upload_message = read_flash(&headers, secret);
    let current_user = get_authenticated_user(&headers, secret);
    let is_staff = staff_user(&app_state, &headers).await.is_some();

    let photos: Vec<PhotoCard> = page
        .photos
        .iter()
        .map(|photo| {
            let item = gallery.feed_item(photo, false);
            PhotoCard {
                url: item.url,
                full_url: item.full_url,
                title: item.title,
                alt_text: if photo.alt_text.is_empty() {
                    photo.display_name()
                } else {
                    photo.alt_text.clone()
                },
            }
        })
        .collect();

    let globals = liquid::object!({
        "site_name": app_state.config.app.name,
        "base_url": app_state.config.app.base_url.as_deref().unwrap_or(""),
        "photos": photos,
        "page_number": page.number,
        "num_pages": page.num_pages,
        "has_next": page.has_next,
        "has_previous": page.has_previous,
        "next_page_number": page.number + 1,
        "previous_page_number": page.number.saturating_sub(1),
        "upload_message": upload_message,
        "current_user": current_user,
        "is_staff": is_staff,
    });

    let html = match app_state
        .template_engine
        .render_page("index.html.liquid", globals)
        .await
    {
        Ok(html) => html,
        Err(status) => return status.into_response(),
    };

    if upload_message.is_some() {
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, expired_cookie_header(FLASH_COOKIE));
        return (headers, html).into_response();
    }

    html.into_response()
}

async fn render_upload_form(
    app_state: &AppState,
    username: &str,
    errors: &[String],
) -> Result<Html<String>, StatusCode> {
    let globals = liquid::object!({
        "site_name": app_state.config.app.name,
        "base_url": app_state.config.app.base_url.as_deref().unwrap_or(""),
        "current_user": username,
        "is_staff": true,
        "errors": errors,
        "allowed_extensions": ALLOWED_EXTENSIONS.join(", "),
        "max_upload_size_mb": app_state.config.gallery.max_upload_size_mb,
    });

    app_state
        .template_engine
        .render_page("upload.html.liquid", globals)
        .await
}

pub async fn upload_form_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(username) = staff_user(&app_state, &headers).await else {
        return login_redirect(UPLOAD_PATH);
    };

    match render_upload_form(&app_state, &username, &[]).await {
        Ok(html) => html.into_response(),
        Err(status) => status.into_response(),
    }
}

/// Read every `files` part of the form. Parts without a file name are the
/// browser's placeholder for an empty file input and are skipped.
async fn collect_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, StatusCode> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed upload body: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            warn!(file = %file_name, "Failed to read upload: {}", e);
            StatusCode::BAD_REQUEST
        })?;

        if file_name.is_empty() && data.is_empty() {
            continue;
        }

        files.push(UploadedFile::from_bytes(file_name, data.to_vec()));
    }

    Ok(files)
}

async fn validation_failure(
    app_state: &AppState,
    username: &str,
    programmatic: bool,
    errors: Vec<String>,
) -> Response {
    if programmatic {
        let mut details = BTreeMap::new();
        details.insert(FILES_FIELD.to_string(), errors);
        return Json(UploadErrorResponse {
            success: false,
            error: "Validation errors".to_string(),
            details,
        })
        .into_response();
    }

    match render_upload_form(app_state, username, &errors).await {
        Ok(html) => html.into_response(),
        Err(status) => status.into_response(),
    }
}

pub async fn upload_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let Some(username) = staff_user(&app_state, &headers).await else {
        return login_redirect(UPLOAD_PATH);
    };
    let programmatic = is_programmatic(&headers);

    let files = match collect_files(&mut multipart).await {
        Ok(files) => files,
        Err(status) => return status.into_response(),
    };

    if files.is_empty() {
        return validation_failure(
            &app_state,
            &username,
            programmatic,
            vec!["This field is required.".to_string()],
        )
        .await;
    }

    info!(user = %username, files = files.len(), "Upload received");
    let report = app_state.gallery.ingest_batch(files).await;

    if report.all_rejected() {
        return validation_failure(&app_state, &username, programmatic, report.errors()).await;
    }

    let message = report.message();

    if programmatic {
        return Json(UploadSuccessResponse {
            success: true,
            redirect_url: "/".to_string(),
            message,
            errors: report.errors(),
        })
        .into_response();
    }

    let mut response_headers = HeaderMap::new();
    if report.uploaded > 0 {
        match flash_cookie_header(&app_state.config.app.session_secret, &message) {
            Some(cookie) => {
                response_headers.insert(SET_COOKIE, cookie);
            }
            None => error!("Upload message could not be stored"),
        }
    }

    (response_headers, Redirect::to("/")).into_response()
}

pub async fn all_photos_json_handler(State(app_state): State<AppState>) -> Response {
    let mut response = Json(app_state.gallery.all_photos().await).into_response();
    response
        .headers_mut()
        .insert("cache-control", HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_programmatic_detection() {
        assert!(is_programmatic(&headers(&[("x-requested-with", "XMLHttpRequest")])));
        assert!(is_programmatic(&headers(&[("accept", "application/json")])));
        assert!(is_programmatic(&headers(&[(
            "accept",
            "application/json; q=1.0, text/html"
        )])));

        assert!(!is_programmatic(&headers(&[])));
        assert!(!is_programmatic(&headers(&[(
            "accept",
            "text/html,application/xhtml+xml,application/json;q=0.9"
        )])));
        assert!(!is_programmatic(&headers(&[("x-requested-with", "fetch")])));
    }
}
