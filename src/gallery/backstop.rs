//! Fills in a missing thumbnail for a stored photo. Runs after the upload
//! pipeline for records it left without one, and from the backfill command.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::image_processing::{self, OUTPUT_EXTENSION};
use super::storage::{THUMBNAILS_DIR, derived_file_name};
use super::{Gallery, GalleryError, Photo, PhotoId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackstopOutcome {
    /// A thumbnail was generated and stored under this name.
    Created(String),
    AlreadyPresent,
    NotFound,
    /// The record's image file is gone from storage.
    OriginalMissing,
    Failed(String),
}

impl Gallery {
    /// Generate a thumbnail for `id` unless it already has one. The row lock
    /// is held for the whole regeneration and the record is re-read under it.
    pub async fn ensure_thumbnail(&self, id: PhotoId) -> BackstopOutcome {
        let _row = self.repository.lock_row(id).await;

        let Some(photo) = self.repository.get(id).await else {
            warn!(photo_id = id, "Photo not found, no thumbnail to create");
            return BackstopOutcome::NotFound;
        };

        if photo.has_thumbnail() {
            debug!(photo_id = id, "Thumbnail already present");
            return BackstopOutcome::AlreadyPresent;
        }

        let original = match self.storage.read(&photo.image).await {
            Ok(bytes) => bytes,
            Err(GalleryError::NotFound(name)) => {
                error!(photo_id = id, image = %name, "Original file missing, cannot create thumbnail");
                return BackstopOutcome::OriginalMissing;
            }
            Err(e) => {
                error!(photo_id = id, "Failed to read original: {}", e);
                return BackstopOutcome::Failed(e.to_string());
            }
        };

        match self.generate_thumbnail(&photo, original).await {
            Ok(name) => {
                info!(photo_id = id, thumbnail = %name, "Thumbnail created");
                BackstopOutcome::Created(name)
            }
            Err(e) => {
                error!(photo_id = id, "Failed to create thumbnail: {}", e);
                BackstopOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run the backstop over every record lacking a thumbnail.
    pub async fn backfill_missing_thumbnails(&self) -> Vec<(PhotoId, BackstopOutcome)> {
        let missing = self.repository.missing_thumbnails().await;
        info!("{} photos without a thumbnail", missing.len());

        let mut outcomes = Vec::with_capacity(missing.len());
        for id in missing {
            outcomes.push((id, self.ensure_thumbnail(id).await));
        }
        outcomes
    }

    async fn generate_thumbnail(
        &self,
        photo: &Photo,
        original: Vec<u8>,
    ) -> Result<String, GalleryError> {
        let variant = self.config.backstop_thumbnail;
        let encoded = tokio::task::spawn_blocking(move || {
            let img = image_processing::decode_oriented(&original)?;
            image_processing::encode_variant(&img, &variant)
        })
        .await??;

        let name = self
            .storage
            .save(
                THUMBNAILS_DIR,
                Utc::now(),
                &derived_file_name(&photo.image, "_thumb", OUTPUT_EXTENSION),
                &encoded.data,
            )
            .await?;

        let stored = name.clone();
        self.repository
            .update(photo.id, move |record| record.thumbnail = Some(stored))
            .await?;

        Ok(name)
    }
}
