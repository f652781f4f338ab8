use super::{BoundingBox, CodecRegistry, TransformPolicy};
use crate::{Error, Result};
use image::imageops::FilterType;
use image::ImageReader;
use std::collections::HashSet;
use std::io::Cursor;
use tracing::debug;

/// Default encode quality for full-size images.
pub const DEFAULT_QUALITY: u8 = 97;

/// Default encode quality for thumbnails.
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 95;

pub const MAIN_POLICY: &str = "main";
pub const THUMBNAIL_POLICY: &str = "thumbnail";

/// Settings the engine is built from once at startup.
///
/// A quality of 0 selects the policy default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub image_codec: String,
    pub quality: u8,
    pub thumbnail_quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: 300,
            max_height: 300,
            image_codec: "jpeg".to_string(),
            quality: 0,
            thumbnail_quality: 0,
        }
    }
}

/// Immutable table of transform policies shared by every request.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    policies: Vec<TransformPolicy>,
}

impl TransformEngine {
    /// Build the `main` and `thumbnail` policies from configuration.
    ///
    /// An `image_codec` that is not registered does not fail construction:
    /// both policies silently use the registry's default codec instead (JPEG
    /// for [`CodecRegistry::default`]). Callers that need strict codec names
    /// should check [`CodecRegistry::get`] first.
    pub fn new(config: &TransformConfig, codecs: &CodecRegistry) -> Result<Self> {
        let codec = codecs.resolve(&config.image_codec);

        let quality = match config.quality {
            0 => DEFAULT_QUALITY,
            q => q,
        };
        let thumbnail_quality = match config.thumbnail_quality {
            0 => DEFAULT_THUMBNAIL_QUALITY,
            q => q,
        };

        Self::with_policies(vec![
            TransformPolicy::new(MAIN_POLICY, codec.clone(), quality),
            TransformPolicy::new(THUMBNAIL_POLICY, codec, thumbnail_quality)
                .with_bounds(BoundingBox::new(config.max_width, config.max_height)),
        ])
    }

    /// Build an engine from an explicit policy list.
    pub fn with_policies(policies: Vec<TransformPolicy>) -> Result<Self> {
        if policies.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one transform policy is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for policy in &policies {
            if policy.name.is_empty() {
                return Err(Error::InvalidConfig("policy name must not be empty".to_string()));
            }
            if !seen.insert(policy.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate policy name '{}'",
                    policy.name
                )));
            }
            if policy.quality > 100 {
                return Err(Error::InvalidConfig(format!(
                    "policy '{}' quality {} is outside 0-100",
                    policy.name, policy.quality
                )));
            }
            if let Some(bounds) = policy.bounds {
                if bounds.max_width == 0 || bounds.max_height == 0 {
                    return Err(Error::InvalidConfig(format!(
                        "policy '{}' bounding box {}x{} has a zero side",
                        policy.name, bounds.max_width, bounds.max_height
                    )));
                }
            }
        }

        Ok(Self { policies })
    }

    pub fn policies(&self) -> &[TransformPolicy] {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&TransformPolicy> {
        self.policies.iter().find(|p| p.name == name)
    }
}

/// Fit `width`x`height` inside `max_width`x`max_height` preserving aspect ratio.
///
/// The bounding box's ratio is compared against the source's ratio using
/// cross-multiplication so no precision is lost. When the box is relatively
/// wider than the source the height binds, otherwise the width binds. The
/// free axis is scaled proportionally and truncated, and never drops below
/// one pixel.
pub fn bounded_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    if max_width == 0 || max_height == 0 {
        return Err(Error::InvalidConfig(format!(
            "bounding box {}x{} has a zero side",
            max_width, max_height
        )));
    }

    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(max_width), u64::from(max_height));

    // max_w / max_h > w / h
    let (out_w, out_h) = if max_w * h > w * max_h {
        (w * max_h / h, max_h)
    } else {
        (max_w, h * max_w / w)
    };

    // Both results are bounded by max_width/max_height, which fit in u32.
    Ok((out_w.max(1) as u32, out_h.max(1) as u32))
}

/// Decode `source` and re-encode it under `policy`, resizing first when the
/// policy has a bounding box.
pub fn transform(source: &[u8], policy: &TransformPolicy) -> Result<Vec<u8>> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| Error::Decode(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| Error::Decode("unrecognised image format".to_string()))?;
    if !format.reading_enabled() {
        return Err(Error::Decode(format!("no decoder available for {:?}", format)));
    }

    let target = match policy.bounds {
        Some(bounds) => {
            let (width, height) = ImageReader::with_format(Cursor::new(source), format)
                .into_dimensions()
                .map_err(|e| Error::SizeUnknown(e.to_string()))?;
            let target =
                bounded_dimensions(width, height, bounds.max_width, bounds.max_height)?;
            debug!(
                "[{}] Resizing {}x{} to {}x{}",
                policy.name, width, height, target.0, target.1
            );
            Some(target)
        }
        None => None,
    };

    let image = reader
        .decode()
        .map_err(|e| Error::Decode(e.to_string()))?;

    let image = match target {
        Some((width, height)) => image.resize_exact(width, height, FilterType::Lanczos3),
        None => image,
    };

    policy.codec.encode(&image, policy.quality)
}
