use image::{DynamicImage, imageops::FilterType};
use tracing::debug;

use super::types::ImageSize;

/// Resize preserving aspect ratio so the result fits inside `bounds`.
/// Images already inside the bounds are returned as they are.
pub fn resize_to_fit(img: &DynamicImage, bounds: ImageSize) -> DynamicImage {
    let original = ImageSize::new(img.width(), img.height());
    let target = original.fit_within(bounds);

    if target == original {
        return img.clone();
    }

    debug!(
        "Resizing {}x{} to {}x{}",
        original.width, original.height, target.width, target.height
    );
    img.resize_exact(target.width, target.height, FilterType::Lanczos3)
}
