use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric, rng};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::GalleryError;

/// Directory prefix for originals and optimized copies.
pub const PHOTOS_DIR: &str = "photos";
/// Directory prefix for thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";

const MAX_NAME_ATTEMPTS: usize = 100;

/// File storage below the media root. Names handed out are relative,
/// `/`-separated and date-partitioned, e.g. `photos/2024/05/01/cat.jpg`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(root: PathBuf, base_url: &str) -> Self {
        Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a stored name. Returns `None` for names that
    /// would escape the media root.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub fn url(&self, name: &str) -> String {
        let encoded: Vec<_> = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.path(name) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, GalleryError> {
        let path = self
            .path(name)
            .ok_or_else(|| GalleryError::NotFound(name.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GalleryError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file. Failures are logged, not returned.
    pub async fn remove(&self, name: &str) {
        let Some(path) = self.path(name) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(name = %name, "Removed media file"),
            Err(e) => warn!(name = %name, "Failed to remove media file: {}", e),
        }
    }

    /// Store `bytes` as `<upload_to>/YYYY/MM/DD/<file_name>`, adding a random
    /// suffix when the name is taken. Returns the stored name.
    pub async fn save(
        &self,
        upload_to: &str,
        at: DateTime<Utc>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, GalleryError> {
        let directory = dated_directory(upload_to, at);
        tokio::fs::create_dir_all(self.root.join(&directory)).await?;

        let file_name = sanitize_file_name(file_name);
        let (stem, extension) = split_extension(&file_name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                format!("{}/{}", directory, file_name)
            } else {
                format!("{}/{}_{}{}", directory, stem, random_suffix(), extension)
            };

            let path = self.root.join(&candidate);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    debug!(name = %candidate, size = bytes.len(), "Stored media file");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(GalleryError::IoError(std::io::Error::other(format!(
            "no free name for {} in {}",
            file_name, directory
        ))))
    }
}

fn dated_directory(upload_to: &str, at: DateTime<Utc>) -> String {
    format!("{}/{}", upload_to, at.format("%Y/%m/%d"))
}

fn random_suffix() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

/// Split `name.ext` into (`name`, `.ext`).
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    }
}

/// Reduce a client-supplied name to a safe file name: base name only,
/// whitespace to underscores, anything but alphanumerics, `-`, `_` and `.`
/// dropped.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let (stem, extension) = match cleaned.rfind('.') {
        Some(pos) => (&cleaned[..pos], &cleaned[pos..]),
        None => (cleaned.as_str(), ""),
    };
    let stem = stem.trim_matches('.');
    let stem = if stem.is_empty() { "upload" } else { stem };

    format!("{}{}", stem, extension)
}

/// Name of a derived file: the original's base name, a suffix and the
/// output extension, e.g. `cat.jpg` → `cat_thumb.webp`.
pub fn derived_file_name(original: &str, suffix: &str, extension: &str) -> String {
    let file_name = sanitize_file_name(original);
    let (stem, _) = split_extension(&file_name);
    format!("{}{}.{}", stem, suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Holiday.JPG"), "My_Holiday.JPG");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cat.png"), "cat.png");
        assert_eq!(sanitize_file_name("кот.jpg"), "кот.jpg");
        assert_eq!(sanitize_file_name("<>.webp"), "upload.webp");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_derived_file_name_keeps_lineage() {
        assert_eq!(derived_file_name("cat.jpg", "_thumb", "webp"), "cat_thumb.webp");
        assert_eq!(
            derived_file_name("photos/2024/05/01/cat.png", "_optimized", "webp"),
            "cat_optimized.webp"
        );
        assert_eq!(derived_file_name("archive.tar.jpg", "_thumb", "webp"), "archive.tar_thumb.webp");
    }

    #[test]
    fn test_url_encodes_segments() {
        let storage = MediaStorage::new(PathBuf::from("media"), "/media/");
        assert_eq!(
            storage.url("photos/2024/05/01/a b.webp"),
            "/media/photos/2024/05/01/a%20b.webp"
        );
    }

    #[test]
    fn test_path_rejects_traversal() {
        let storage = MediaStorage::new(PathBuf::from("media"), "/media");
        assert!(storage.path("../secret").is_none());
        assert!(storage.path("/etc/passwd").is_none());
        assert_eq!(
            storage.path("photos/a.jpg"),
            Some(PathBuf::from("media").join("photos/a.jpg"))
        );
    }

    #[tokio::test]
    async fn test_save_partitions_by_date_and_avoids_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(temp_dir.path().to_path_buf(), "/media");

        let first = storage.save(PHOTOS_DIR, at(), "cat.jpg", b"one").await.unwrap();
        let second = storage.save(PHOTOS_DIR, at(), "cat.jpg", b"two").await.unwrap();

        assert_eq!(first, "photos/2024/05/01/cat.jpg");
        assert_ne!(first, second);
        assert!(second.starts_with("photos/2024/05/01/cat_"));
        assert!(second.ends_with(".jpg"));

        assert_eq!(storage.read(&first).await.unwrap(), b"one");
        assert_eq!(storage.read(&second).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(temp_dir.path().to_path_buf(), "/media");

        assert!(!storage.exists("photos/nope.jpg").await);
        assert!(matches!(
            storage.read("photos/nope.jpg").await,
            Err(GalleryError::NotFound(_))
        ));
    }
}
