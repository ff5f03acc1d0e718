use std::ffi::c_void;

/// Wrapper around libwebp-sys for lossy WebP encoding with an explicit
/// compression method, which the `webp` crate does not expose.
pub struct WebPEncoder {
    width: u32,
    height: u32,
    rgb_data: Vec<u8>,
}

#[derive(Debug)]
pub enum WebPError {
    EncodingFailed,
    InvalidDimensions,
    InvalidData,
    InvalidConfig,
}

impl std::fmt::Display for WebPError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebPError::EncodingFailed => write!(f, "WebP encoding failed"),
            WebPError::InvalidDimensions => write!(f, "Invalid image dimensions"),
            WebPError::InvalidData => write!(f, "Invalid image data"),
            WebPError::InvalidConfig => write!(f, "Invalid WebP encoder configuration"),
        }
    }
}

impl std::error::Error for WebPError {}

/// Largest width or height a WebP bitstream can carry.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

impl WebPEncoder {
    /// Create a new WebP encoder over packed RGB8 pixels
    pub fn new(width: u32, height: u32, rgb_data: Vec<u8>) -> Result<Self, WebPError> {
        if width == 0 || height == 0 || width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(WebPError::InvalidDimensions);
        }

        let expected_size = width as usize * height as usize * 3;
        if rgb_data.len() != expected_size {
            return Err(WebPError::InvalidData);
        }

        Ok(WebPEncoder {
            width,
            height,
            rgb_data,
        })
    }

    /// Encode with the given quality (0-100) and method (0 fast .. 6 smallest)
    pub fn encode(&self, quality: f32, method: i32) -> Result<Vec<u8>, WebPError> {
        unsafe {
            let mut config =
                libwebp_sys::WebPConfig::new().map_err(|_| WebPError::EncodingFailed)?;

            config.quality = quality;
            config.method = method;

            if libwebp_sys::WebPValidateConfig(&config) == 0 {
                return Err(WebPError::InvalidConfig);
            }

            let mut picture =
                libwebp_sys::WebPPicture::new().map_err(|_| WebPError::EncodingFailed)?;

            picture.width = self.width as i32;
            picture.height = self.height as i32;
            picture.use_argb = 0; // YUV

            if libwebp_sys::WebPPictureImportRGB(
                &mut picture,
                self.rgb_data.as_ptr(),
                (self.width * 3) as i32,
            ) == 0
            {
                libwebp_sys::WebPPictureFree(&mut picture);
                return Err(WebPError::EncodingFailed);
            }

            let mut memory_writer = WebPMemoryWriter::new();
            picture.writer = Some(webp_memory_write);
            picture.custom_ptr = &mut memory_writer as *mut _ as *mut c_void;

            let encode_result = libwebp_sys::WebPEncode(&config, &mut picture);

            libwebp_sys::WebPPictureFree(&mut picture);

            if encode_result == 0 {
                return Err(WebPError::EncodingFailed);
            }

            Ok(memory_writer.into_data())
        }
    }
}

/// Collects encoder output chunks
struct WebPMemoryWriter {
    data: Vec<u8>,
}

impl WebPMemoryWriter {
    fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn write(&mut self, data: &[u8]) -> bool {
        self.data.extend_from_slice(data);
        true
    }

    fn into_data(self) -> Vec<u8> {
        self.data
    }
}

unsafe extern "C" fn webp_memory_write(
    data: *const u8,
    data_size: usize,
    picture: *const libwebp_sys::WebPPicture,
) -> i32 {
    unsafe {
        if data.is_null() || picture.is_null() {
            return 0;
        }

        let writer = (*picture).custom_ptr as *mut WebPMemoryWriter;
        if writer.is_null() {
            return 0;
        }

        let slice = std::slice::from_raw_parts(data, data_size);
        if (*writer).write(slice) { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webp_encoder_creation() {
        let rgb_data = vec![255u8; 10 * 10 * 3];
        assert!(WebPEncoder::new(10, 10, rgb_data).is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let rgb_data = vec![255u8; 10 * 10 * 3];
        let encoder = WebPEncoder::new(0, 10, rgb_data);
        assert!(matches!(encoder, Err(WebPError::InvalidDimensions)));

        let encoder = WebPEncoder::new(WEBP_MAX_DIMENSION + 1, 1, Vec::new());
        assert!(matches!(encoder, Err(WebPError::InvalidDimensions)));
    }

    #[test]
    fn test_invalid_data_size() {
        let rgb_data = vec![255u8; 100]; // Too small for 10x10 RGB
        let encoder = WebPEncoder::new(10, 10, rgb_data);
        assert!(matches!(encoder, Err(WebPError::InvalidData)));
    }

    #[test]
    fn test_basic_encoding() {
        let rgb_data = vec![128u8; 10 * 10 * 3];
        let encoder = WebPEncoder::new(10, 10, rgb_data).unwrap();

        let webp_data = encoder.encode(95.0, 6).unwrap();

        assert!(webp_data.len() >= 12);
        assert_eq!(&webp_data[0..4], b"RIFF");
        assert_eq!(&webp_data[8..12], b"WEBP");
    }

    #[test]
    fn test_out_of_range_method_is_rejected() {
        let encoder = WebPEncoder::new(4, 4, vec![0u8; 4 * 4 * 3]).unwrap();
        assert!(matches!(encoder.encode(90.0, 9), Err(WebPError::InvalidConfig)));
    }
}
