use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::warn;

/// Output encoder for a single image format.
///
/// Encoders only ever see decoded pixels, so nothing from the source file's
/// metadata (EXIF, ICC profiles, XMP) survives into the output.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;
    fn content_type(&self) -> &'static str;
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>>;
}

pub struct JpegCodec;

impl Codec for JpegCodec {
    fn name(&self) -> &str {
        "jpeg"
    }

    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| Error::Encode(format!("jpeg: {}", e)))?;
        Ok(bytes)
    }
}

/// Lossless PNG output. Quality is ignored.
pub struct PngCodec;

impl Codec for PngCodec {
    fn name(&self) -> &str {
        "png"
    }

    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn encode(&self, image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| Error::Encode(format!("png: {}", e)))?;
        Ok(bytes)
    }
}

/// Mapping from codec name to encoder, with one default used for unknown names.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default: Arc<dyn Codec>,
}

impl CodecRegistry {
    pub fn new(default: Arc<dyn Codec>) -> Self {
        let mut codecs = HashMap::new();
        codecs.insert(default.name().to_ascii_lowercase(), default.clone());
        Self { codecs, default }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.insert(codec.name().to_ascii_lowercase(), codec);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    /// Look up a codec by name, falling back to the default codec when the
    /// name is not registered. The fallback is logged but is not an error.
    pub fn resolve(&self, name: &str) -> Arc<dyn Codec> {
        match self.get(name) {
            Some(codec) => codec,
            None => {
                warn!(
                    "Unknown image codec '{}', falling back to '{}'",
                    name,
                    self.default.name()
                );
                self.default.clone()
            }
        }
    }

    pub fn default_codec(&self) -> Arc<dyn Codec> {
        self.default.clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.codecs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(Arc::new(JpegCodec)).with_codec(Arc::new(PngCodec))
    }
}
