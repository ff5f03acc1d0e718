use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::image_processing::{self, OUTPUT_EXTENSION};
use super::storage::{PHOTOS_DIR, THUMBNAILS_DIR, derived_file_name};
use super::validation::{self, UploadedFile};
use super::{BatchReport, Gallery, GalleryError, NewPhoto, Photo, UploadFailure};

const OPTIMIZED_SUFFIX: &str = "_optimized";
const THUMBNAIL_SUFFIX: &str = "_thumb";

impl Gallery {
    /// Run every file of an upload through the pipeline, one after another.
    /// A failing file never stops the rest of the batch.
    pub async fn ingest_batch(&self, files: Vec<UploadedFile>) -> BatchReport {
        let mut report = BatchReport::default();

        for file in files {
            match self.ingest_file(file).await {
                Ok(photo) => {
                    report.uploaded += 1;
                    report.photos.push(photo.id);
                }
                Err(failure) => report.failures.push(failure),
            }
        }

        info!(
            uploaded = report.uploaded,
            failed = report.failures.len(),
            "Upload batch processed"
        );
        report
    }

    /// Validate, store the original, then derive the optimized copy and the
    /// thumbnail. The record exists as soon as the original is stored.
    pub async fn ingest_file(&self, mut file: UploadedFile) -> Result<Photo, UploadFailure> {
        if let Err(e) = validation::validate_upload(&mut file, self.config.max_upload_size_mb) {
            warn!(file = %file.name, "Upload rejected: {}", e);
            return Err(UploadFailure::rejected(&file.name, e));
        }

        let file_name = file.name;
        let bytes = file.content.into_inner();

        let photo = self
            .store_original(&file_name, &bytes)
            .await
            .map_err(|e| {
                error!(file = %file_name, "Failed to store original: {}", e);
                UploadFailure::failed(&file_name, e)
            })?;

        match self.derive_variants(&photo, &file_name, bytes).await {
            Ok(photo) => {
                info!(photo_id = photo.id, file = %file_name, "Photo stored");
                Ok(photo)
            }
            Err(e) => {
                error!(photo_id = photo.id, file = %file_name, "Failed to process image: {}", e);
                let outcome = self.ensure_thumbnail(photo.id).await;
                debug!(photo_id = photo.id, "Thumbnail fallback: {:?}", outcome);
                Err(UploadFailure::failed(&file_name, e))
            }
        }
    }

    async fn store_original(&self, file_name: &str, bytes: &[u8]) -> Result<Photo, GalleryError> {
        let uploaded_at = Utc::now();
        let stored = self
            .storage
            .save(PHOTOS_DIR, uploaded_at, file_name, bytes)
            .await?;
        self.repository
            .insert(NewPhoto::new(stored, uploaded_at))
            .await
    }

    /// Decode once, then encode both variants from the same image while
    /// holding the record's row lock.
    async fn derive_variants(
        &self,
        photo: &Photo,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Photo, GalleryError> {
        let _row = self.repository.lock_row(photo.id).await;

        let variants = [self.config.optimized, self.config.thumbnail];
        let rendered = tokio::task::spawn_blocking(move || {
            image_processing::render_variants(&bytes, &variants)
        })
        .await??;

        let mut rendered = rendered.into_iter();
        let (Some(optimized), Some(thumbnail)) = (rendered.next(), rendered.next()) else {
            return Err(GalleryError::Encode("variant missing from output".to_string()));
        };
        debug!(
            photo_id = photo.id,
            "Optimized {}x{}, thumbnail {}x{}",
            optimized.size.width,
            optimized.size.height,
            thumbnail.size.width,
            thumbnail.size.height
        );

        let optimized_name = self
            .storage
            .save(
                PHOTOS_DIR,
                photo.uploaded_at,
                &derived_file_name(file_name, OPTIMIZED_SUFFIX, OUTPUT_EXTENSION),
                &optimized.data,
            )
            .await?;
        let thumbnail_name = match self
            .storage
            .save(
                THUMBNAILS_DIR,
                photo.uploaded_at,
                &derived_file_name(file_name, THUMBNAIL_SUFFIX, OUTPUT_EXTENSION),
                &thumbnail.data,
            )
            .await
        {
            Ok(name) => name,
            Err(e) => {
                self.storage.remove(&optimized_name).await;
                return Err(e);
            }
        };

        let update = self
            .repository
            .update(photo.id, |record| {
                record.image = optimized_name.clone();
                record.thumbnail = Some(thumbnail_name.clone());
            })
            .await;

        // Derived files nothing points at are removed again
        if update.is_err() {
            self.storage.remove(&optimized_name).await;
            self.storage.remove(&thumbnail_name).await;
        }
        update
    }
}
