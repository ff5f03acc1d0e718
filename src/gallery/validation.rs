//! Upload checks run before any image processing: size ceiling, extension
//! allow-list and binary signature.

use std::io::{Cursor, Read, Seek, SeekFrom};
use thiserror::Error;
use tracing::debug;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Number of leading bytes inspected for a signature.
const SIGNATURE_LEN: u64 = 12;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File is too large ({size_mb}MB). Maximum: {limit_mb}MB")]
    TooLarge { size_mb: u64, limit_mb: u64 },

    #[error("File extension \"{extension}\" is not allowed. Allowed extensions: jpg, jpeg, png, webp")]
    Extension { extension: String },

    #[error("Invalid file format. Only JPEG, PNG and WEBP are allowed.")]
    Format,

    #[error("Cannot read upload: {0}")]
    Unreadable(String),
}

/// How an accepted upload was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSignature {
    Jpeg,
    Png,
    WebP,
    /// No known magic bytes; accepted on the strength of the extension.
    ExtensionOnly,
}

/// A received file: its client-side name and a seekable view of its bytes.
#[derive(Debug)]
pub struct UploadedFile<R = Cursor<Vec<u8>>> {
    pub name: String,
    pub size: u64,
    pub content: R,
}

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            content: Cursor::new(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.get_ref()
    }
}

/// Lower-cased extension of a file name, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn has_allowed_extension(name: &str) -> bool {
    file_extension(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn check_size(size: u64, limit_mb: u64) -> Result<(), ValidationError> {
    let limit_bytes = limit_mb.saturating_mul(1024 * 1024);
    if size > limit_bytes {
        return Err(ValidationError::TooLarge {
            size_mb: size / 1024 / 1024,
            limit_mb,
        });
    }
    Ok(())
}

pub fn check_extension(name: &str) -> Result<(), ValidationError> {
    if has_allowed_extension(name) {
        Ok(())
    } else {
        Err(ValidationError::Extension {
            extension: file_extension(name).unwrap_or_default(),
        })
    }
}

/// Match a header against the known magic sequences.
pub fn detect_signature(header: &[u8]) -> Option<ImageSignature> {
    if header.starts_with(&JPEG_MAGIC) {
        Some(ImageSignature::Jpeg)
    } else if header.starts_with(&PNG_MAGIC) {
        Some(ImageSignature::Png)
    } else if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        Some(ImageSignature::WebP)
    } else {
        None
    }
}

fn read_header<R: Read + Seek>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SIGNATURE_LEN as usize);
    reader.seek(SeekFrom::Start(0))?;
    Read::by_ref(reader)
        .take(SIGNATURE_LEN)
        .read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(header)
}

/// Inspect the first bytes of `reader`, then rewind it to the start.
///
/// Without a recognized signature the upload is accepted only when `name`
/// carries an allowed extension.
pub fn check_signature<R: Read + Seek>(
    reader: &mut R,
    name: &str,
) -> Result<ImageSignature, ValidationError> {
    let header = read_header(reader).map_err(|e| ValidationError::Unreadable(e.to_string()))?;

    if let Some(signature) = detect_signature(&header) {
        return Ok(signature);
    }

    if has_allowed_extension(name) {
        debug!(file = %name, "No known signature, trusting extension");
        return Ok(ImageSignature::ExtensionOnly);
    }

    Err(ValidationError::Format)
}

/// Run every check in order: size, extension, signature.
pub fn validate_upload<R: Read + Seek>(
    file: &mut UploadedFile<R>,
    limit_mb: u64,
) -> Result<ImageSignature, ValidationError> {
    check_size(file.size, limit_mb)?;
    check_extension(&file.name)?;
    check_signature(&mut file.content, &file.name)
}
