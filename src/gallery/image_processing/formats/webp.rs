use image::DynamicImage;
use tracing::{debug, error};

use crate::gallery::GalleryError;
use crate::webp_encoder::{WEBP_MAX_DIMENSION, WebPEncoder};

/// Encode as lossy WebP with the given quality and compression method.
pub fn encode(image: &DynamicImage, quality: f32, method: i32) -> Result<Vec<u8>, GalleryError> {
    let rgb_image = image.to_rgb8();
    let (width, height) = rgb_image.dimensions();
    let rgb_data = rgb_image.into_raw();

    match WebPEncoder::new(width, height, rgb_data).and_then(|e| e.encode(quality, method)) {
        Ok(webp_data) => {
            debug!(
                "Encoded {}x{} WebP at q{} m{}: {} bytes",
                width,
                height,
                quality,
                method,
                webp_data.len()
            );
            Ok(webp_data)
        }
        Err(e) => {
            error!("WebP encoding error: {}, falling back to basic webp crate", e);
            encode_fallback(image, quality)
        }
    }
}

/// Fallback encoder using the basic webp crate (default method)
fn encode_fallback(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, GalleryError> {
    let rgb_image = image.to_rgb8();
    let (width, height) = rgb_image.dimensions();
    if width == 0 || height == 0 || width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(GalleryError::Encode(format!(
            "{}x{} exceeds WebP limits",
            width, height
        )));
    }

    let encoder = webp::Encoder::from_rgb(rgb_image.as_raw(), width, height);
    let encoded_webp = encoder.encode(quality);
    Ok(encoded_webp.to_vec())
}
