use super::BlobStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A stored object: body plus the content type it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MockBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
    failing_buckets: Arc<Mutex<HashSet<String>>>,
    put_count: Arc<Mutex<usize>>,
    delay: Option<Duration>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` into `bucket` fail.
    pub fn with_failing_bucket(self, bucket: &str) -> Self {
        self.failing_buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string());
        self
    }

    /// Sleep before completing each `put`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn get_objects(&self) -> HashMap<(String, String), StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        *self.put_count.lock().unwrap() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_buckets.lock().unwrap().contains(bucket) {
            return Err(Error::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "Mock failure".to_string(),
            });
        }

        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_put_and_get() {
        let store = MockBlobStore::new();

        store
            .put("images", "dress.jpg", b"jpeg bytes", "image/jpeg")
            .await
            .unwrap();

        let object = store.get_object("images", "dress.jpg").unwrap();
        assert_eq!(object.data, b"jpeg bytes");
        assert_eq!(object.content_type, "image/jpeg");
        assert!(store.get_object("thumbnails", "dress.jpg").is_none());
        assert_eq!(store.get_put_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_overwrites() {
        let store = MockBlobStore::new();

        store.put("images", "a", b"first", "image/jpeg").await.unwrap();
        store.put("images", "a", b"second", "image/jpeg").await.unwrap();

        assert_eq!(store.get_object("images", "a").unwrap().data, b"second");
        assert_eq!(store.get_objects().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_with_failing_bucket() {
        let store = MockBlobStore::new().with_failing_bucket("thumbnails");

        let result = store.put("thumbnails", "a", b"data", "image/jpeg").await;
        assert!(matches!(result, Err(Error::Upload { .. })));

        store.put("images", "a", b"data", "image/jpeg").await.unwrap();
        assert_eq!(store.get_put_count(), 2);
        assert!(store.get_object("thumbnails", "a").is_none());
    }
}
