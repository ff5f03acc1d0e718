use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type PhotoId = u64;

/// One gallery entry. `image` always names a stored file; `thumbnail` is
/// absent until a derived copy has been generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub image: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub alt_text: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Photo {
    /// Title if set, else the stored image's file name.
    pub fn display_name(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        Path::new(&self.image)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.image)
            .to_string()
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Fields supplied when a record is first created.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub image: String,
    pub title: String,
    pub alt_text: String,
    pub uploaded_at: DateTime<Utc>,
}

impl NewPhoto {
    pub fn new(image: String, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            image,
            title: String::new(),
            alt_text: String::new(),
            uploaded_at,
        }
    }
}

/// Feed entry as served to the browser script and the JSON endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PhotoId>,
    pub url: String,
    pub full_url: String,
    pub title: String,
}

/// One resolved page of the feed, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub photos: Vec<Photo>,
    pub number: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub photos: Vec<FeedItem>,
    pub has_next: bool,
}

impl FeedResponse {
    /// Answer for a page outside the feed.
    pub fn empty() -> Self {
        Self {
            photos: Vec::new(),
            has_next: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<FeedItem>,
}

/// A file of a batch that did not make it through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub reason: String,
    /// Rejected before anything was stored.
    pub rejected: bool,
}

impl UploadFailure {
    pub fn rejected(file_name: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
            rejected: true,
        }
    }

    pub fn failed(file_name: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
            rejected: false,
        }
    }
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

/// Outcome of processing a multi-file upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub uploaded: usize,
    pub photos: Vec<PhotoId>,
    pub failures: Vec<UploadFailure>,
}

impl BatchReport {
    pub fn errors(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    pub fn message(&self) -> String {
        let mut message = format!(
            "Uploaded {} photo{}",
            self.uploaded,
            if self.uploaded == 1 { "" } else { "s" }
        );
        if !self.failures.is_empty() {
            message.push_str(&format!(" (with errors: {})", self.failures.len()));
        }
        message
    }

    /// Every file was turned away by validation, so nothing was stored.
    pub fn all_rejected(&self) -> bool {
        !self.failures.is_empty() && self.uploaded == 0 && self.failures.iter().all(|f| f.rejected)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSuccessResponse {
    pub success: bool,
    pub redirect_url: String,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadErrorResponse {
    pub success: bool,
    pub error: String,
    pub details: std::collections::BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedQuery {
    pub page: Option<String>,
}
