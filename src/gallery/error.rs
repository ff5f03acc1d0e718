use thiserror::Error;

use super::validation::ValidationError;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Cannot encode image: {0}")]
    Encode(String),

    #[error("Photo database {0} is in use by another process")]
    Locked(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
