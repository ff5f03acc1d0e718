use crate::Config;
use crate::gallery::{PHOTOS_DIR, THUMBNAILS_DIR};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Media directory is not accessible: {0}")]
    MediaDirectoryInaccessible(String),
}

async fn ensure_directory(dir: &Path, errors: &mut Vec<StartupCheckError>) {
    if dir.exists() {
        info!("Directory exists: {:?}", dir);
        return;
    }

    info!("Directory does not exist, creating: {:?}", dir);
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        error!("Failed to create directory {:?}: {}", dir, e);
        errors.push(StartupCheckError::DirectoryCreationFailed {
            path: dir.display().to_string(),
            source: e,
        });
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let media_root = &config.gallery.media_root;
    ensure_directory(media_root, &mut errors).await;
    ensure_directory(&media_root.join(PHOTOS_DIR), &mut errors).await;
    ensure_directory(&media_root.join(THUMBNAILS_DIR), &mut errors).await;

    if let Some(parent) = config.gallery.database.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_directory(parent, &mut errors).await;
    }

    if media_root.exists()
        && let Err(e) = tokio::fs::read_dir(media_root).await
    {
        error!("Media directory is not accessible: {}", e);
        errors.push(StartupCheckError::MediaDirectoryInaccessible(
            media_root.display().to_string(),
        ));
    }

    let static_dir = &config.static_files.directory;
    if !static_dir.exists() {
        warn!("Static files directory does not exist: {:?}", static_dir);
    } else {
        info!("Static files directory exists: {:?}", static_dir);
    }

    let templates_dir = &config.templates.directory;
    if !templates_dir.exists() {
        warn!("Templates directory does not exist: {:?}", templates_dir);
        warn!("This may cause issues with page rendering");
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
    }

    if !config.app.user_database.exists() {
        warn!(
            "User database {:?} not found; add a staff user with `user add`",
            config.app.user_database
        );
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
