//! Artifact store trait and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::ArtifactPayload;
use crate::errors::ArtifactStoreError;

/// Blob storage for stage artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `payload` under `bucket`/`key` and returns its URL.
    ///
    /// Uploading the same key twice overwrites the object.
    async fn upload(&self, bucket: &str, key: &str, payload: &ArtifactPayload) -> Result<String, ArtifactStoreError>;

    /// Deletes an object.
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ArtifactStoreError>;
}

/// An object held by [`InMemoryArtifactStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// MIME type sent with the upload.
    pub content_type: String,
    /// Stored bytes.
    pub bytes: Vec<u8>,
    /// Base64 MD5 of the bytes.
    pub content_md5: String,
}

/// Artifact store backed by a concurrent map.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    base_url: String,
    objects: DashMap<(String, String), StoredObject>,
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new("memory://artifacts")
    }
}

impl InMemoryArtifactStore {
    /// Creates a store serving URLs under `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    /// URL an object is served from.
    #[must_use]
    pub fn url_for(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.base_url)
    }

    /// Returns true if the object exists.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects.contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// A copy of a stored object.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Keys stored in a bucket, sorted.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored objects across buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upload(&self, bucket: &str, key: &str, payload: &ArtifactPayload) -> Result<String, ArtifactStoreError> {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content_type: payload.content_type().to_string(),
                bytes: payload.bytes().to_vec(),
                content_md5: payload.content_md5(),
            },
        );
        debug!(bucket = %bucket, key = %key, size = payload.len(), "Stored artifact");
        Ok(self.url_for(bucket, key))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ArtifactStoreError> {
        self.objects
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| ArtifactStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
