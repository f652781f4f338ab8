//! Process configuration
//!
//! Every setting can be given as a flag or an environment variable; a `.env`
//! file is loaded first when present.

use crate::storage::{BucketConfig, S3Config};
use crate::transform::TransformConfig;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "image-relay")]
#[command(about = "Optimize uploaded images, generate thumbnails and store both in S3")]
pub struct Config {
    /// Host to bind the HTTP server to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Maximum bounded width for thumbnails.
    #[arg(long, env = "MAX_WIDTH", default_value_t = 300, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_width: u32,

    /// Maximum bounded height for thumbnails.
    #[arg(long, env = "MAX_HEIGHT", default_value_t = 300, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_height: u32,

    /// Bucket for full-size images.
    #[arg(long, env = "IMAGE_BUCKET", default_value = "images")]
    pub image_bucket: String,

    /// Bucket for thumbnails.
    #[arg(long, env = "THUMBNAIL_BUCKET", default_value = "thumbnails")]
    pub thumbnail_bucket: String,

    /// Output codec. Unknown names fall back to jpeg.
    #[arg(long, env = "IMAGE_CODEC", default_value = "jpeg")]
    pub image_codec: String,

    /// Encode quality for full-size images (0 selects the default of 97).
    #[arg(long, env = "QUALITY", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: u8,

    /// Encode quality for thumbnails (0 selects the default of 95).
    #[arg(long, env = "THUMBNAIL_QUALITY", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub thumbnail_quality: u8,

    /// Custom S3-compatible endpoint (DigitalOcean Spaces, MinIO, integration tests).
    #[arg(long, env = "AWS_ENDPOINT")]
    pub aws_endpoint: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    pub aws_secret_key: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// Requests processed at once; later requests wait for a slot.
    #[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent_requests: u64,

    /// Per-request deadline in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load `.env` (if any), then parse flags and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            max_width: self.max_width,
            max_height: self.max_height,
            image_codec: self.image_codec.clone(),
            quality: self.quality,
            thumbnail_quality: self.thumbnail_quality,
        }
    }

    pub fn bucket_config(&self) -> BucketConfig {
        BucketConfig {
            image_bucket: self.image_bucket.clone(),
            thumbnail_bucket: self.thumbnail_bucket.clone(),
        }
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            endpoint: self.aws_endpoint.clone().filter(|e| !e.is_empty()),
            access_key_id: self.aws_access_key_id.clone().filter(|k| !k.is_empty()),
            secret_access_key: self.aws_secret_key.clone().filter(|k| !k.is_empty()),
            region: self.aws_region.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_concurrent_requests(&self) -> usize {
        usize::try_from(self.max_concurrent_requests).unwrap_or(usize::MAX)
    }
}
