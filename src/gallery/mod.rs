// Gallery module - photo records, upload ingestion and the feed
mod backstop;
mod error;
mod feed;
mod handlers;
pub mod image_processing;
mod pipeline;
mod repository;
mod storage;
mod types;
pub mod validation;

// Re-export public items
pub use backstop::BackstopOutcome;
pub use error::GalleryError;
pub use feed::{PageSelection, num_pages, resolve_page};
pub use handlers::{
    all_photos_json_handler, index_handler, is_programmatic, upload_form_handler, upload_handler,
};
pub use repository::PhotoRepository;
pub use storage::{MediaStorage, PHOTOS_DIR, THUMBNAILS_DIR};
pub use types::*;
pub use validation::{UploadedFile, ValidationError};

use std::sync::Arc;

use crate::GalleryConfig;

pub type SharedGallery = Arc<Gallery>;

pub struct Gallery {
    pub(crate) config: GalleryConfig,
    pub(crate) repository: PhotoRepository,
    pub(crate) storage: MediaStorage,
}

impl Gallery {
    /// Load the photo table and attach media storage.
    pub async fn open(config: GalleryConfig) -> Result<Self, GalleryError> {
        let repository = PhotoRepository::open(config.database.clone()).await?;
        let storage = MediaStorage::new(config.media_root.clone(), &config.media_url);

        Ok(Self {
            config,
            repository,
            storage,
        })
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn repository(&self) -> &PhotoRepository {
        &self.repository
    }

    pub fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    /// Serialized view of a photo. The grid URL falls back to the full image
    /// while no thumbnail exists.
    pub fn feed_item(&self, photo: &Photo, with_id: bool) -> FeedItem {
        let full_url = self.storage.url(&photo.image);
        let url = match photo.thumbnail.as_deref() {
            Some(thumbnail) if !thumbnail.is_empty() => self.storage.url(thumbnail),
            _ => full_url.clone(),
        };

        FeedItem {
            id: with_id.then_some(photo.id),
            url,
            full_url,
            title: photo.display_name(),
        }
    }
}
