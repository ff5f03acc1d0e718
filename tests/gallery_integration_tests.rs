mod common;

use axum::http::{StatusCode, header};
use axum_test::multipart::{MultipartForm, Part};
use common::{ajax, auth_cookie, jpeg_bytes, png_bytes, spawn_app};
use serde_json::Value;

fn file_part(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
    Part::bytes(bytes).file_name(name).mime_type(mime)
}

#[tokio::test]
async fn test_empty_gallery_feed() {
    let app = spawn_app().await;

    let (name, value) = ajax();
    let response = app.server.get("/").add_header(name, value).await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["photos"], serde_json::json!([]));
    assert_eq!(json["has_next"], false);

    let html = app.server.get("/").await;
    html.assert_status_ok();
    assert!(html.text().contains("No photos yet"));
}

#[tokio::test]
async fn test_upload_requires_staff() {
    let app = spawn_app().await;

    let response = app.server.get("/upload/").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header(header::LOCATION), "/login/?next=/upload/");

    let form = MultipartForm::new().add_part("files", file_part(jpeg_bytes(8, 8), "a.jpg", "image/jpeg"));
    let response = app.server.post("/upload/").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::FOUND);

    // Logged in but not staff
    let (name, value) = auth_cookie("bob");
    let response = app.server.get("/upload/").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::FOUND);

    // Forged cookie
    let response = app
        .server
        .get("/upload/")
        .add_header(header::COOKIE, "auth=alice:not-a-signature".parse::<axum::http::HeaderValue>().unwrap())
        .await;
    assert_eq!(response.status_code(), StatusCode::FOUND);

    let (name, value) = auth_cookie("alice");
    let response = app.server.get("/upload/").add_header(name, value).await;
    response.assert_status_ok();
    assert!(response.text().contains("upload-form"));
}

#[tokio::test]
async fn test_programmatic_upload_reports_per_file_errors() {
    let app = spawn_app().await;

    let form = MultipartForm::new()
        .add_part("files", file_part(jpeg_bytes(1200, 900), "beach.jpg", "image/jpeg"))
        .add_part("files", file_part(b"just text".to_vec(), "notes.txt", "text/plain"))
        .add_part("files", file_part(png_bytes(300, 500), "forest.png", "image/png"));

    let (cookie, cookie_value) = auth_cookie("alice");
    let (xrw, xrw_value) = ajax();
    let response = app
        .server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .add_header(xrw, xrw_value)
        .multipart(form)
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["redirect_url"], "/");
    assert_eq!(json["message"], "Uploaded 2 photos (with errors: 1)");
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("notes.txt: "));

    let all: Value = app.server.get("/all_photos.json").await.json();
    let photos = all["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 2);
    for photo in photos {
        assert!(photo["id"].as_u64().unwrap() >= 1);
        assert!(photo["url"].as_str().unwrap().starts_with("/media/thumbnails/"));
        assert!(photo["full_url"].as_str().unwrap().ends_with("_optimized.webp"));
    }
    // Newest first
    assert!(photos[0]["title"].as_str().unwrap().starts_with("forest"));

    let thumbnail = app.server.get(photos[0]["url"].as_str().unwrap()).await;
    thumbnail.assert_status_ok();
    assert_eq!(thumbnail.header(header::CONTENT_TYPE), "image/webp");
    let img = image::load_from_memory(thumbnail.as_bytes()).unwrap();
    assert!(img.width() <= 800 && img.height() <= 800);
}

#[tokio::test]
async fn test_upload_with_only_invalid_files_is_a_validation_error() {
    let app = spawn_app().await;

    let form = MultipartForm::new()
        .add_part("files", file_part(b"GIF89a....".to_vec(), "anim.gif", "image/gif"));

    let (cookie, cookie_value) = auth_cookie("alice");
    let (xrw, xrw_value) = ajax();
    let response = app
        .server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .add_header(xrw, xrw_value)
        .multipart(form)
        .await;

    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Validation errors");
    let details = json["details"]["files"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert!(details[0].as_str().unwrap().contains("gif"));

    let all: Value = app.server.get("/all_photos.json").await.json();
    assert_eq!(all["photos"], serde_json::json!([]));
}

#[tokio::test]
async fn test_upload_without_files_is_a_validation_error() {
    let app = spawn_app().await;

    let form = MultipartForm::new().add_text("title", "nothing");
    let (cookie, cookie_value) = auth_cookie("alice");
    let (xrw, xrw_value) = ajax();
    let response = app
        .server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .add_header(xrw, xrw_value)
        .multipart(form)
        .await;

    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["details"]["files"][0], "This field is required.");
}

#[tokio::test]
async fn test_browser_upload_redirects_with_message() {
    let app = spawn_app().await;

    let form = MultipartForm::new()
        .add_part("files", file_part(jpeg_bytes(64, 48), "cat.jpg", "image/jpeg"));
    let (cookie, cookie_value) = auth_cookie("alice");
    let response = app
        .server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/");

    let set_cookie = response.header(header::SET_COOKIE);
    let flash = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
    assert!(flash.starts_with("upload_message="));

    let index = app
        .server
        .get("/")
        .add_header(header::COOKIE, flash.parse::<axum::http::HeaderValue>().unwrap())
        .await;
    index.assert_status_ok();
    assert!(index.text().contains("Uploaded 1 photo"));
    assert!(
        index
            .header(header::SET_COOKIE)
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );
}

#[tokio::test]
async fn test_browser_upload_of_invalid_file_rerenders_form() {
    let app = spawn_app().await;

    let form = MultipartForm::new()
        .add_part("files", file_part(b"%PDF-1.4".to_vec(), "doc.pdf", "application/pdf"));
    let (cookie, cookie_value) = auth_cookie("alice");
    let response = app
        .server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .multipart(form)
        .await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("upload-form"));
    assert!(html.contains("doc.pdf"));
}

#[tokio::test]
async fn test_out_of_range_page() {
    let app = spawn_app().await;

    let form = MultipartForm::new()
        .add_part("files", file_part(jpeg_bytes(40, 30), "one.jpg", "image/jpeg"));
    let (cookie, cookie_value) = auth_cookie("alice");
    app.server
        .post("/upload/")
        .add_header(cookie, cookie_value)
        .multipart(form)
        .await;

    let (xrw, xrw_value) = ajax();
    let json: Value = app
        .server
        .get("/")
        .add_query_param("page", 999)
        .add_header(xrw, xrw_value)
        .await
        .json();
    assert_eq!(json, serde_json::json!({ "photos": [], "has_next": false }));

    // Browsers get the last page instead
    let html = app.server.get("/").add_query_param("page", 999).await;
    html.assert_status_ok();
    assert!(html.text().contains("one_thumb.webp"));

    let json: Value = app
        .server
        .get("/")
        .add_query_param("page", "abc")
        .add_header(header::ACCEPT, "application/json".parse::<axum::http::HeaderValue>().unwrap())
        .await
        .json();
    assert_eq!(json["photos"].as_array().unwrap().len(), 1);
    assert_eq!(json["has_next"], false);
    assert!(json["photos"][0].get("id").is_none());
}

#[tokio::test]
async fn test_all_photos_json_is_get_only() {
    let app = spawn_app().await;

    let response = app.server.post("/all_photos.json").await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_media_and_static_routes() {
    let app = spawn_app().await;

    let escaped = app.server.get("/media/../photos.json").await;
    assert!(escaped.status_code().is_client_error());
    app.server.get("/media/photos/missing.webp").await.assert_status_not_found();

    let js = app.server.get("/static/js/gallery.js").await;
    js.assert_status_ok();

    let robots = app.server.get("/robots.txt").await;
    robots.assert_status_ok();
    assert!(robots.text().contains("Disallow: /upload/"));
}
