use super::Codec;
use crate::{Error, Result};
use image::{DynamicImage, GenericImageView};
use std::sync::{Arc, Mutex};

/// Codec that records what it was asked to encode instead of producing a
/// real image. Output is `mock:<width>x<height>:q<quality>`.
#[derive(Clone)]
pub struct MockCodec {
    name: String,
    encode_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCodec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            encode_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_encode_count(&self) -> usize {
        *self.encode_count.lock().unwrap()
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl Codec for MockCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &'static str {
        "application/x-mock-image"
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        *self.encode_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Encode("Mock failure".to_string()));
        }

        let (width, height) = image.dimensions();
        Ok(format!("mock:{}x{}:q{}", width, height, quality).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_mock_codec_describes_input() {
        let codec = MockCodec::new("fake");
        let image = DynamicImage::ImageRgb8(RgbImage::new(7, 3));

        let bytes = codec.encode(&image, 42).unwrap();

        assert_eq!(bytes, b"mock:7x3:q42");
        assert_eq!(codec.get_encode_count(), 1);
    }

    #[test]
    fn test_mock_codec_with_failure() {
        let codec = MockCodec::default().with_failure(true);
        let image = DynamicImage::ImageRgb8(RgbImage::new(1, 1));

        let result = codec.encode(&image, 90);

        assert!(matches!(result, Err(Error::Encode(_))));
        assert_eq!(codec.get_encode_count(), 1);
    }
}
