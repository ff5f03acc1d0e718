#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use photo_gallery::{
    Config, api::create_signed_cookie, create_app,
    login::{AUTH_COOKIE, User, UserDatabase},
};
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub server: TestServer,
    pub config: Config,
    pub temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.app.session_secret = SECRET.to_string();
    config.app.user_database = temp_dir.path().join("users.toml");
    config.templates.directory = PathBuf::from("templates");
    config.static_files.directory = PathBuf::from("static");
    config.gallery.media_root = temp_dir.path().join("media");
    config.gallery.database = temp_dir.path().join("photos.json");
    config
}

/// App with a staff user `alice` and a regular user `bob`, both with
/// password `secret`.
pub async fn spawn_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let mut users = UserDatabase::new();
    users.add_user("alice", User::with_password("secret", true));
    users.add_user("bob", User::with_password("secret", false));
    users.save_to_file(&config.app.user_database).await.unwrap();

    let app = create_app(config.clone()).await.unwrap();
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        config,
        temp_dir,
    }
}

pub fn auth_cookie(username: &str) -> (HeaderName, HeaderValue) {
    let signed = create_signed_cookie(SECRET, AUTH_COOKIE, username).unwrap();
    (
        header::COOKIE,
        HeaderValue::from_str(&format!("{}={}", AUTH_COOKIE, signed)).unwrap(),
    )
}

pub fn ajax() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    )
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90])
    }));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([20, 200, 20])));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
