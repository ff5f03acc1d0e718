use image::DynamicImage;
use tracing::{debug, warn};

/// How far into a file the EXIF segment is searched for.
const EXIF_SCAN_LIMIT: usize = 64 * 1024;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// EXIF orientations that are corrected. Mirrored variants (2, 4, 5, 7)
/// are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    Rotate180,
    /// Tag 6: stored rotated, needs 90° clockwise to display upright
    Rotate90,
    /// Tag 8: needs 270° clockwise
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u16) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::Rotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => img,
            Orientation::Rotate180 => img.rotate180(),
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

/// Read the orientation tag from encoded image bytes. Missing or unreadable
/// EXIF data yields `Normal`.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let exif = match rexif::parse_buffer(bytes) {
        Ok(exif) => exif,
        Err(e) => {
            if has_exif_segment(bytes) {
                warn!("Unreadable EXIF data, keeping stored orientation: {}", e);
            } else {
                debug!("No EXIF data: {}", e);
            }
            return Orientation::Normal;
        }
    };

    let value = exif
        .entries
        .iter()
        .find(|entry| entry.tag == rexif::ExifTag::Orientation)
        .and_then(|entry| match &entry.value {
            rexif::TagValue::U16(values) => values.first().copied(),
            _ => None,
        });

    match value {
        Some(value) => {
            debug!("EXIF orientation {}", value);
            Orientation::from_exif(value)
        }
        None => Orientation::Normal,
    }
}

fn has_exif_segment(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(EXIF_SCAN_LIMIT)];
    head.windows(EXIF_HEADER.len()).any(|w| w == EXIF_HEADER)
}
