/// Extension given to every derived file.
pub const OUTPUT_EXTENSION: &str = "webp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest size with the same aspect ratio that fits inside `bounds`.
    /// Never larger than `self`, never smaller than 1x1.
    pub fn fit_within(&self, bounds: ImageSize) -> ImageSize {
        if self.width <= bounds.width && self.height <= bounds.height {
            return *self;
        }

        let scale = f64::min(
            bounds.width as f64 / self.width as f64,
            bounds.height as f64 / self.height as f64,
        );
        let width = ((self.width as f64 * scale).round() as u32).clamp(1, bounds.width.max(1));
        let height = ((self.height as f64 * scale).round() as u32).clamp(1, bounds.height.max(1));

        ImageSize::new(width, height)
    }
}

/// An encoded derived file and the pixel size it was encoded at.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub size: ImageSize,
}
