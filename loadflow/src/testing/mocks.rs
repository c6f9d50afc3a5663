//! Store doubles that fail on demand.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::artifacts::{ArtifactPayload, ArtifactStore, InMemoryArtifactStore};
use crate::core::LoadingRecord;
use crate::errors::{ArtifactStoreError, StoreError};
use crate::store::{InMemoryRecordStore, RecordFilter, RecordStore};

/// Artifact store that accepts a fixed number of uploads, then fails.
///
/// Deletes fail unless enabled with [`with_working_removes`](Self::with_working_removes).
#[derive(Debug, Default)]
pub struct FailingArtifactStore {
    inner: InMemoryArtifactStore,
    upload_budget: AtomicUsize,
    removes_work: AtomicBool,
    upload_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl FailingArtifactStore {
    /// A store where every upload and delete fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the first `uploads` uploads succeed.
    #[must_use]
    pub fn with_upload_budget(self, uploads: usize) -> Self {
        self.upload_budget.store(uploads, Ordering::SeqCst);
        self
    }

    /// Makes deletes succeed.
    #[must_use]
    pub fn with_working_removes(self) -> Self {
        self.removes_work.store(true, Ordering::SeqCst);
        self
    }

    /// Objects currently stored.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.inner.len()
    }

    /// Upload attempts seen.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Delete attempts seen.
    #[must_use]
    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn upload(&self, bucket: &str, key: &str, payload: &ArtifactPayload) -> Result<String, ArtifactStoreError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let admitted = self
            .upload_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !admitted {
            return Err(ArtifactStoreError::Backend(anyhow::anyhow!("simulated upload failure")));
        }
        self.inner.upload(bucket, key, payload).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ArtifactStoreError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.removes_work.load(Ordering::SeqCst) {
            self.inner.remove(bucket, key).await
        } else {
            Err(ArtifactStoreError::Backend(anyhow::anyhow!("simulated delete failure")))
        }
    }
}

/// Record store whose writes fail while reads go to an in-memory store.
#[derive(Debug, Default)]
pub struct FailingRecordStore {
    inner: InMemoryRecordStore,
    replace_calls: AtomicUsize,
}

impl FailingRecordStore {
    /// Creates a store with failing `replace`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing store, for seeding rows.
    #[must_use]
    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    /// Write attempts seen.
    #[must_use]
    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn get(&self, id: Uuid) -> Result<Option<LoadingRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: RecordFilter) -> Result<Vec<LoadingRecord>, StoreError> {
        self.inner.list(filter).await
    }

    async fn insert(&self, record: &LoadingRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn replace(&self, _record: &LoadingRecord, _expected_version: u64) -> Result<(), StoreError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend(anyhow::anyhow!("simulated write failure")))
    }
}
