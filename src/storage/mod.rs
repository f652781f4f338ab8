//! Blob storage for derived images
//!
//! Writes encoded artifacts to S3-compatible storage (AWS S3, DigitalOcean
//! Spaces, MinIO) and routes each artifact to its configured bucket.

pub mod client;
pub mod mock;
pub mod uploader;

pub use client::{S3BlobStore, S3Config};
pub use mock::MockBlobStore;
pub use uploader::{BucketConfig, Uploader};

use crate::Result;
use async_trait::async_trait;

/// Raw write access to a blob store.
///
/// Implementations must not retry; a failed `put` is reported as-is.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, data: &[u8], content_type: &str) -> Result<()>;
}
