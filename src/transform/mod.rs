//! Image transformation and format conversion
//!
//! Decodes uploaded images and re-encodes them under a named policy, either
//! at full size or resized to fit a bounding box.

pub mod codec;
pub mod engine;
pub mod mock;

pub use codec::{Codec, CodecRegistry, JpegCodec, PngCodec};
pub use engine::{
    bounded_dimensions, transform, TransformConfig, TransformEngine, DEFAULT_QUALITY,
    DEFAULT_THUMBNAIL_QUALITY, MAIN_POLICY, THUMBNAIL_POLICY,
};
pub use mock::MockCodec;

use std::fmt;
use std::sync::Arc;

/// Maximum width and height an image may occupy after a ratio-preserving resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub max_width: u32,
    pub max_height: u32,
}

impl BoundingBox {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

/// Named encode parameters applied to one derived artifact.
///
/// A policy without bounds only re-encodes; it never resizes.
#[derive(Clone)]
pub struct TransformPolicy {
    pub name: String,
    pub codec: Arc<dyn Codec>,
    pub quality: u8,
    pub bounds: Option<BoundingBox>,
}

impl TransformPolicy {
    pub fn new(name: impl Into<String>, codec: Arc<dyn Codec>, quality: u8) -> Self {
        Self {
            name: name.into(),
            codec,
            quality,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.content_type()
    }
}

impl fmt::Debug for TransformPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPolicy")
            .field("name", &self.name)
            .field("codec", &self.codec.name())
            .field("quality", &self.quality)
            .field("bounds", &self.bounds)
            .finish()
    }
}
