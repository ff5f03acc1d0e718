use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::{
    path::{Component, Path, PathBuf},
    time::UNIX_EPOCH,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Streams files from one directory. Used for `/static` and for the media
/// root.
#[derive(Clone)]
pub struct StaticFileHandler {
    pub root: PathBuf,
}

impl StaticFileHandler {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a request path onto the root, refusing anything but plain
    /// path segments.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub async fn serve(&self, path: &str) -> Response {
        let Some(file_path) = self.resolve(path) else {
            warn!("Path traversal attempt: {:?}", path);
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        };

        debug!("Attempting to serve file: {:?}", file_path);

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
            Err(e) => {
                debug!("Failed to get metadata for {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Failed to open file {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();

        let stream = ReaderStream::new(file);
        let body = Body::from_stream(stream);

        // Stored media never changes under the same name
        let cache_control = if content_type.starts_with("image/") {
            "public, max-age=31536000"
        } else if content_type.starts_with("text/css")
            || content_type.starts_with("application/javascript")
            || content_type.starts_with("text/javascript")
        {
            "public, max-age=300, must-revalidate"
        } else {
            "public, max-age=3600"
        };

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, metadata.len())
            .header(header::CACHE_CONTROL, cache_control);

        if let Ok(modified) = metadata.modified()
            && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
        {
            response = response.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));

            let etag = format!("\"{}-{}\"", duration.as_secs(), metadata.len());
            response = response.header(header::ETAG, etag);
        }

        response.body(body).unwrap_or_else(|e| {
            error!("Failed to build file response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_rejects_escapes() {
        let handler = StaticFileHandler::new(PathBuf::from("static"));
        assert!(handler.resolve("../config.toml").is_none());
        assert!(handler.resolve("css/../../x").is_none());
        assert!(handler.resolve("").is_none());
        assert_eq!(
            handler.resolve("/css/gallery.css"),
            Some(PathBuf::from("static").join("css/gallery.css"))
        );
    }

    #[tokio::test]
    async fn test_serves_existing_file_with_type() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("js")).await.unwrap();
        tokio::fs::write(dir.path().join("js/app.js"), "console.log(1);")
            .await
            .unwrap();
        let handler = StaticFileHandler::new(dir.path().to_path_buf());

        let response = handler.serve("js/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.contains("javascript"));
        assert!(response.headers().contains_key(header::ETAG));

        assert_eq!(handler.serve("js").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(handler.serve("missing.css").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(handler.serve("../etc/passwd").await.status(), StatusCode::FORBIDDEN);
    }
}
