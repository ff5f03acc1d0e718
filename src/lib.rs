use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod api;
pub mod gallery;
pub mod login;
pub mod robots;
pub mod startup_checks;
pub mod static_files;
pub mod templating;
pub mod webp_encoder;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub templates: TemplateConfig,
    pub static_files: StaticConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    /// Key for signing session and message cookies.
    pub session_secret: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_user_database")]
    pub user_database: PathBuf,
}

fn default_user_database() -> PathBuf {
    PathBuf::from("users.toml")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Root directory for originals, optimized copies and thumbnails.
    pub media_root: PathBuf,
    /// Public URL prefix the media root is served under.
    pub media_url: String,
    /// JSON document holding the photo table.
    pub database: PathBuf,
    pub photos_per_page: usize,
    pub max_upload_size_mb: u64,
    pub max_request_size_mb: u64,
    pub optimized: VariantConfig,
    pub thumbnail: VariantConfig,
    pub backstop_thumbnail: VariantConfig,
}

/// Bounding box and WebP settings for one derived variant.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct VariantConfig {
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    #[serde(default = "default_webp_method")]
    pub method: i32,
}

fn default_webp_method() -> i32 {
    6
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            media_url: "/media".to_string(),
            database: PathBuf::from("photos.json"),
            photos_per_page: 12,
            max_upload_size_mb: 100,
            max_request_size_mb: 1024,
            optimized: VariantConfig {
                width: 2560,
                height: 2560,
                quality: 95.0,
                method: 6,
            },
            thumbnail: VariantConfig {
                width: 800,
                height: 800,
                quality: 95.0,
                method: 6,
            },
            backstop_thumbnail: VariantConfig {
                width: 600,
                height: 600,
                quality: 90.0,
                method: 6,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "Photo Gallery".to_string(),
                log_level: "info".to_string(),
                session_secret: "change-me-in-production".to_string(),
                base_url: None,
                user_database: default_user_database(),
            },
            templates: TemplateConfig {
                directory: PathBuf::from("templates"),
            },
            static_files: StaticConfig {
                directory: PathBuf::from("static"),
            },
            gallery: GalleryConfig::default(),
        }
    }
}

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub static_handler: static_files::StaticFileHandler,
    pub media_handler: static_files::StaticFileHandler,
    pub gallery: gallery::SharedGallery,
    pub users: Arc<RwLock<login::UserDatabase>>,
    pub config: Config,
}

async fn static_file_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    app_state.static_handler.serve(&path).await
}

async fn media_file_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    app_state.media_handler.serve(&path).await
}

pub async fn create_app(config: Config) -> Result<Router, gallery::GalleryError> {
    let template_engine = Arc::new(templating::TemplateEngine::new(
        config.templates.directory.clone(),
    ));

    let static_handler =
        static_files::StaticFileHandler::new(config.static_files.directory.clone());
    let media_handler = static_files::StaticFileHandler::new(config.gallery.media_root.clone());

    let gallery = Arc::new(gallery::Gallery::open(config.gallery.clone()).await?);

    let users = match login::UserDatabase::load_from_file(&config.app.user_database).await {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!(
                "Could not load user database {:?}: {}; nobody can log in",
                config.app.user_database,
                e
            );
            login::UserDatabase::new()
        }
    };

    let upload_limit = (config.gallery.max_request_size_mb as usize).saturating_mul(1024 * 1024);

    let app_state = AppState {
        template_engine,
        static_handler,
        media_handler,
        gallery,
        users: Arc::new(RwLock::new(users)),
        config: config.clone(),
    };

    let media_route = format!("{}/{{*path}}", config.gallery.media_url.trim_end_matches('/'));

    Ok(Router::new()
        .route("/", get(gallery::index_handler))
        .route(
            "/upload/",
            get(gallery::upload_form_handler)
                .post(gallery::upload_handler)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/all_photos.json", get(gallery::all_photos_json_handler))
        .route(
            "/login/",
            get(login::login_page).post(login::login_submit),
        )
        .route("/logout/", get(login::logout).post(login::logout))
        .route(&media_route, get(media_file_handler))
        .route("/static/{*path}", get(static_file_handler))
        .route("/robots.txt", get(robots::robots_txt_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let headers = request.headers();
                    let user_agent = headers
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        query = ?request.uri().query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state))
}
