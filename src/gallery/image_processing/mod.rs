// Image processing module - decoding, orientation, resizing and WebP output
pub mod formats;
mod orientation;
mod resize;
mod types;

pub use orientation::{Orientation, read_orientation};
pub use resize::resize_to_fit;
pub use types::{EncodedImage, ImageSize, OUTPUT_EXTENSION};

use image::DynamicImage;

use crate::VariantConfig;
use crate::gallery::GalleryError;

/// Decode image bytes, rotate per EXIF orientation and flatten to RGB8.
/// Transparency is dropped.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, GalleryError> {
    let img = image::load_from_memory(bytes).map_err(GalleryError::Decode)?;
    let img = read_orientation(bytes).apply(img);

    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Fit `img` inside the variant's bounds and encode it as WebP.
pub fn encode_variant(
    img: &DynamicImage,
    variant: &VariantConfig,
) -> Result<EncodedImage, GalleryError> {
    let resized = resize_to_fit(img, ImageSize::new(variant.width, variant.height));
    let data = formats::webp::encode(&resized, variant.quality, variant.method)?;

    Ok(EncodedImage {
        data,
        size: ImageSize::new(resized.width(), resized.height()),
    })
}

/// Decode once and encode every requested variant, in order.
pub fn render_variants(
    bytes: &[u8],
    variants: &[VariantConfig],
) -> Result<Vec<EncodedImage>, GalleryError> {
    let img = decode_oriented(bytes)?;
    variants
        .iter()
        .map(|variant| encode_variant(&img, variant))
        .collect()
}
