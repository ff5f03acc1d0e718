use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use super::{GalleryError, NewPhoto, Photo, PhotoId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PhotoTable {
    next_id: PhotoId,
    photos: BTreeMap<PhotoId, Photo>,
}

/// Photo records, kept in memory and written through to a JSON document
/// after every change.
///
/// One process owns a document at a time: `open` takes an exclusive lock on
/// `<database>.lock` that is held until the repository is dropped.
pub struct PhotoRepository {
    path: PathBuf,
    _lock: std::fs::File,
    table: RwLock<PhotoTable>,
    /// Serializes document writes so the file always holds the latest state.
    writer: tokio::sync::Mutex<()>,
    row_locks: Mutex<HashMap<PhotoId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PhotoRepository {
    pub async fn open(path: PathBuf) -> Result<Self, GalleryError> {
        let lock = acquire_lock(&path).await?;

        let table = if tokio::fs::try_exists(&path).await? {
            let json = tokio::fs::read_to_string(&path).await?;
            let table: PhotoTable = serde_json::from_str(&json)?;
            info!("Loaded {} photo records from {:?}", table.photos.len(), path);
            table
        } else {
            debug!("Photo database {:?} not found, starting empty", path);
            PhotoTable::default()
        };

        Ok(Self {
            path,
            _lock: lock,
            table: RwLock::new(table),
            writer: tokio::sync::Mutex::new(()),
            row_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn insert(&self, new_photo: NewPhoto) -> Result<Photo, GalleryError> {
        self.mutate(|table| {
            table.next_id += 1;
            let photo = Photo {
                id: table.next_id,
                image: new_photo.image,
                thumbnail: None,
                title: new_photo.title,
                alt_text: new_photo.alt_text,
                uploaded_at: new_photo.uploaded_at,
            };
            table.photos.insert(photo.id, photo.clone());
            Ok(photo)
        })
        .await
    }

    pub async fn get(&self, id: PhotoId) -> Option<Photo> {
        self.table.read().await.photos.get(&id).cloned()
    }

    /// Apply `update` to one record and persist it. The image reference
    /// cannot be cleared.
    pub async fn update<F>(&self, id: PhotoId, update: F) -> Result<Photo, GalleryError>
    where
        F: FnOnce(&mut Photo),
    {
        self.mutate(|table| {
            let photo = table
                .photos
                .get_mut(&id)
                .ok_or_else(|| GalleryError::NotFound(format!("photo {}", id)))?;
            let previous_image = photo.image.clone();
            update(&mut *photo);
            if photo.image.is_empty() {
                photo.image = previous_image;
            }
            Ok(photo.clone())
        })
        .await
    }

    pub async fn count(&self) -> usize {
        self.table.read().await.photos.len()
    }

    /// A slice of the newest-first ordering.
    pub async fn newest_first(&self, offset: usize, limit: usize) -> Vec<Photo> {
        let table = self.table.read().await;
        let mut photos: Vec<&Photo> = table.photos.values().collect();
        sort_newest_first(&mut photos);
        photos
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn all_newest_first(&self) -> Vec<Photo> {
        self.newest_first(0, usize::MAX).await
    }

    pub async fn missing_thumbnails(&self) -> Vec<PhotoId> {
        self.table
            .read()
            .await
            .photos
            .values()
            .filter(|photo| !photo.has_thumbnail())
            .map(|photo| photo.id)
            .collect()
    }

    /// Exclusive lock on one record, held while its derived files are
    /// generated. Waits if another task holds it.
    pub async fn lock_row(&self, id: PhotoId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .row_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Apply `change` to a copy of the table and publish the copy only once
    /// the document holding it is on disk.
    async fn mutate<T, F>(&self, change: F) -> Result<T, GalleryError>
    where
        F: FnOnce(&mut PhotoTable) -> Result<T, GalleryError>,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.table.read().await.clone();
        let result = change(&mut next)?;
        let json = serde_json::to_string_pretty(&next)?;
        self.write_document(&json).await?;

        *self.table.write().await = next;
        Ok(result)
    }

    async fn write_document(&self, json: &str) -> Result<(), GalleryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

async fn acquire_lock(path: &Path) -> Result<std::fs::File, GalleryError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut lock_path = path.to_path_buf().into_os_string();
    lock_path.push(".lock");
    let lock_path = PathBuf::from(lock_path);

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .await?
        .into_std()
        .await;

    file.try_lock_exclusive().map_err(|e| {
        warn!("Photo database {:?} is locked: {}", path, e);
        GalleryError::Locked(path.display().to_string())
    })?;
    debug!("Locked photo database {:?}", lock_path);

    Ok(file)
}

fn sort_newest_first(photos: &mut [&Photo]) {
    photos.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
