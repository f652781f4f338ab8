use super::BlobStore;
use crate::models::UploadTarget;
use crate::transform::{MAIN_POLICY, THUMBNAIL_POLICY};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    pub image_bucket: String,
    pub thumbnail_bucket: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            image_bucket: "images".to_string(),
            thumbnail_bucket: "thumbnails".to_string(),
        }
    }
}

/// Routes named artifacts to their bucket and writes them to the store.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn BlobStore>,
    routes: HashMap<String, String>,
}

impl Uploader {
    /// Route `main` to the image bucket and `thumbnail` to the thumbnail bucket.
    pub fn new(store: Arc<dyn BlobStore>, buckets: &BucketConfig) -> Result<Self> {
        Self::empty(store)
            .with_route(MAIN_POLICY, &buckets.image_bucket)?
            .with_route(THUMBNAIL_POLICY, &buckets.thumbnail_bucket)
    }

    /// An uploader with no routes.
    pub fn empty(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            routes: HashMap::new(),
        }
    }

    /// Route `policy` to `bucket`. Each bucket holds one kind of artifact, so a
    /// bucket already routed to another policy is rejected.
    pub fn with_route(mut self, policy: &str, bucket: &str) -> Result<Self> {
        if bucket.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "bucket for '{}' must not be empty",
                policy
            )));
        }
        if let Some((other, _)) = self
            .routes
            .iter()
            .find(|(p, b)| p.as_str() != policy && b.as_str() == bucket)
        {
            return Err(Error::InvalidConfig(format!(
                "bucket '{}' is already used by policy '{}'",
                bucket, other
            )));
        }
        self.routes.insert(policy.to_string(), bucket.to_string());
        Ok(self)
    }

    pub fn has_route(&self, policy: &str) -> bool {
        self.routes.contains_key(policy)
    }

    /// Where the artifact for `policy` derived from `name` is stored. The key
    /// is the name unchanged, so repeated names overwrite earlier objects.
    pub fn target(&self, policy: &str, name: &str) -> Result<UploadTarget> {
        let bucket = self.routes.get(policy).ok_or_else(|| {
            Error::InvalidConfig(format!("no bucket configured for policy '{}'", policy))
        })?;

        Ok(UploadTarget {
            bucket: bucket.clone(),
            key: name.to_string(),
        })
    }

    pub async fn upload(&self, target: &UploadTarget, data: &[u8], content_type: &str) -> Result<()> {
        self.store
            .put(&target.bucket, &target.key, data, content_type)
            .await
            .map_err(|e| match e {
                upload @ Error::Upload { .. } => upload,
                other => Error::Upload {
                    bucket: target.bucket.clone(),
                    key: target.key.clone(),
                    message: other.to_string(),
                },
            })?;

        info!(
            "Uploaded {} bytes to {}/{}",
            data.len(),
            target.bucket,
            target.key
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockBlobStore;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl BlobStore for BrokenStore {
        async fn put(&self, _bucket: &str, _key: &str, _data: &[u8], _ct: &str) -> Result<()> {
            Err(Error::Internal("socket closed".to_string()))
        }
    }

    #[test]
    fn test_default_routes() {
        let uploader =
            Uploader::new(Arc::new(MockBlobStore::new()), &BucketConfig::default()).unwrap();

        let main = uploader.target(MAIN_POLICY, "dress.jpg").unwrap();
        assert_eq!(main.bucket, "images");
        assert_eq!(main.key, "dress.jpg");

        let thumbnail = uploader.target(THUMBNAIL_POLICY, "dress.jpg").unwrap();
        assert_eq!(thumbnail.bucket, "thumbnails");
        assert_eq!(thumbnail.key, "dress.jpg");
    }

    #[test]
    fn test_unknown_policy_has_no_target() {
        let uploader =
            Uploader::new(Arc::new(MockBlobStore::new()), &BucketConfig::default()).unwrap();

        assert!(!uploader.has_route("poster"));
        assert!(matches!(
            uploader.target("poster", "dress.jpg"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_bucket_is_rejected() {
        let buckets = BucketConfig {
            image_bucket: " ".to_string(),
            ..BucketConfig::default()
        };

        assert!(Uploader::new(Arc::new(MockBlobStore::new()), &buckets).is_err());
    }

    #[test]
    fn test_shared_bucket_is_rejected() {
        let buckets = BucketConfig {
            image_bucket: "media".to_string(),
            thumbnail_bucket: "media".to_string(),
        };

        assert!(matches!(
            Uploader::new(Arc::new(MockBlobStore::new()), &buckets),
            Err(Error::InvalidConfig(_))
        ));

        let extra = Uploader::new(Arc::new(MockBlobStore::new()), &BucketConfig::default())
            .unwrap()
            .with_route("small", "thumbnails");
        assert!(matches!(extra, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rerouting_a_policy_keeps_one_bucket() {
        let uploader = Uploader::empty(Arc::new(MockBlobStore::new()))
            .with_route(MAIN_POLICY, "images")
            .unwrap()
            .with_route(MAIN_POLICY, "images")
            .unwrap();

        assert_eq!(uploader.target(MAIN_POLICY, "a").unwrap().bucket, "images");
    }

    #[tokio::test]
    async fn test_upload_writes_to_target() {
        let store = MockBlobStore::new();
        let uploader = Uploader::new(Arc::new(store.clone()), &BucketConfig::default()).unwrap();
        let target = uploader.target(THUMBNAIL_POLICY, "dress.jpg").unwrap();

        uploader.upload(&target, b"thumb", "image/jpeg").await.unwrap();

        let object = store.get_object("thumbnails", "dress.jpg").unwrap();
        assert_eq!(object.data, b"thumb");
        assert_eq!(object.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_transport_errors_become_upload_errors() {
        let uploader = Uploader::empty(Arc::new(BrokenStore))
            .with_route("main", "images")
            .unwrap();
        let target = uploader.target("main", "a").unwrap();

        let err = uploader.upload(&target, b"x", "image/jpeg").await.unwrap_err();

        assert_eq!(err.kind(), "upload");
        assert!(err.to_string().contains("socket closed"));
        assert!(err.to_string().contains("images/a"));
    }
}
