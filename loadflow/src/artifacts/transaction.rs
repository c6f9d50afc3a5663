//! Compensable upload transaction.
//!
//! Uploads made during one advance are tracked until the record write
//! succeeds. On failure they are deleted once; deletes that fail go to the
//! [`CleanupJournal`]. A transaction dropped without commit or compensation
//! journals its uploads.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ArtifactPayload, ArtifactStore, CleanupJournal};
use crate::errors::{LoadflowError, Result};
use crate::stages::ArtifactKind;

/// An object uploaded within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifact {
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// URL returned by the store.
    pub url: String,
}

/// Outcome of a compensation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    /// Uploads deleted.
    pub deleted: Vec<UploadedArtifact>,
    /// Uploads whose delete failed and were journaled.
    pub orphaned: Vec<UploadedArtifact>,
}

impl CompensationReport {
    /// Returns true if nothing had to be compensated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.orphaned.is_empty()
    }
}

/// Tracks uploads for one record write.
pub struct ArtifactTransaction {
    store: Arc<dyn ArtifactStore>,
    journal: Arc<CleanupJournal>,
    record_id: Uuid,
    uploaded: Vec<UploadedArtifact>,
    finished: bool,
}

impl std::fmt::Debug for ArtifactTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactTransaction")
            .field("record_id", &self.record_id)
            .field("uploaded", &self.uploaded)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ArtifactTransaction {
    /// Opens a transaction for `record_id`.
    #[must_use]
    pub fn begin(store: Arc<dyn ArtifactStore>, journal: Arc<CleanupJournal>, record_id: Uuid) -> Self {
        Self {
            store,
            journal,
            record_id,
            uploaded: Vec::new(),
            finished: false,
        }
    }

    /// Uploads one artifact and tracks it.
    pub async fn upload(
        &mut self,
        kind: ArtifactKind,
        bucket: &str,
        key: &str,
        payload: &ArtifactPayload,
    ) -> Result<String> {
        let url = self
            .store
            .upload(bucket, key, payload)
            .await
            .map_err(|source| LoadflowError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;

        debug!(record_id = %self.record_id, bucket = %bucket, key = %key, "Artifact uploaded");
        self.uploaded.push(UploadedArtifact {
            kind,
            bucket: bucket.to_string(),
            key: key.to_string(),
            url: url.clone(),
        });
        Ok(url)
    }

    /// Uploads made so far.
    #[must_use]
    pub fn uploaded(&self) -> &[UploadedArtifact] {
        &self.uploaded
    }

    /// URLs of the uploads, in upload order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.uploaded.iter().map(|u| u.url.clone()).collect()
    }

    /// Keeps the uploads. Call after the record write succeeded.
    pub fn commit(mut self) -> Vec<UploadedArtifact> {
        self.finished = true;
        std::mem::take(&mut self.uploaded)
    }

    /// Deletes every upload once, journaling failed deletes.
    pub async fn compensate(mut self, reason: &str) -> CompensationReport {
        self.finished = true;
        let uploaded = std::mem::take(&mut self.uploaded);
        let mut report = CompensationReport::default();

        // Newest first, mirroring the upload order.
        for artifact in uploaded.into_iter().rev() {
            match self.store.remove(&artifact.bucket, &artifact.key).await {
                Ok(()) => report.deleted.push(artifact),
                Err(err) => {
                    self.journal.record(
                        &artifact.bucket,
                        &artifact.key,
                        self.record_id,
                        format!("{reason}; delete failed: {err}"),
                    );
                    report.orphaned.push(artifact);
                }
            }
        }

        debug!(
            record_id = %self.record_id,
            deleted = report.deleted.len(),
            orphaned = report.orphaned.len(),
            "Compensated uploads"
        );
        report
    }
}

impl Drop for ArtifactTransaction {
    fn drop(&mut self) {
        if self.finished || self.uploaded.is_empty() {
            return;
        }
        warn!(
            record_id = %self.record_id,
            uploads = self.uploaded.len(),
            "Upload transaction dropped before completion"
        );
        for artifact in &self.uploaded {
            self.journal.record(
                &artifact.bucket,
                &artifact.key,
                self.record_id,
                "advance abandoned before completion",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::testing::FailingArtifactStore;

    fn setup() -> (Arc<InMemoryArtifactStore>, Arc<CleanupJournal>, ArtifactTransaction) {
        let store = Arc::new(InMemoryArtifactStore::default());
        let journal = Arc::new(CleanupJournal::new());
        let tx = ArtifactTransaction::begin(store.clone(), journal.clone(), Uuid::new_v4());
        (store, journal, tx)
    }

    #[tokio::test]
    async fn test_commit_keeps_uploads() {
        let (store, journal, mut tx) = setup();
        tx.upload(ArtifactKind::Photo, "fotos", "a.jpg", &ArtifactPayload::jpeg(vec![1]))
            .await
            .unwrap();

        let kept = tx.commit();

        assert_eq!(kept.len(), 1);
        assert!(store.contains("fotos", "a.jpg"));
        assert!(journal.is_empty());
    }

    #[tokio::test]
    async fn test_compensate_deletes_uploads() {
        let (store, journal, mut tx) = setup();
        tx.upload(ArtifactKind::Document, "docs", "nf.pdf", &ArtifactPayload::pdf(vec![1]))
            .await
            .unwrap();
        tx.upload(ArtifactKind::Document, "docs", "nf.xml", &ArtifactPayload::xml(vec![2]))
            .await
            .unwrap();

        let report = tx.compensate("write failed").await;

        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.deleted[0].key, "nf.xml");
        assert!(report.orphaned.is_empty());
        assert!(store.is_empty());
        assert!(journal.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_is_journaled() {
        let store = Arc::new(FailingArtifactStore::new().with_upload_budget(1));
        let journal = Arc::new(CleanupJournal::new());
        let record_id = Uuid::new_v4();
        let mut tx = ArtifactTransaction::begin(store.clone(), journal.clone(), record_id);
        tx.upload(ArtifactKind::Photo, "fotos", "a.jpg", &ArtifactPayload::jpeg(vec![1]))
            .await
            .unwrap();

        let report = tx.compensate("write failed").await;

        assert_eq!(report.orphaned.len(), 1);
        let orphans = journal.orphans_for(record_id);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].key, "a.jpg");
        assert!(orphans[0].reason.starts_with("write failed"));
    }

    #[tokio::test]
    async fn test_upload_failure_maps_to_upload_error() {
        let store = Arc::new(FailingArtifactStore::new());
        let journal = Arc::new(CleanupJournal::new());
        let mut tx = ArtifactTransaction::begin(store, journal, Uuid::new_v4());

        let err = tx
            .upload(ArtifactKind::Photo, "fotos", "a.jpg", &ArtifactPayload::jpeg(vec![1]))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadflowError::Upload { ref bucket, .. } if bucket == "fotos"));
        assert!(tx.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_drop_without_completion_journals() {
        let (_store, journal, mut tx) = setup();
        tx.upload(ArtifactKind::Photo, "fotos", "a.jpg", &ArtifactPayload::jpeg(vec![1]))
            .await
            .unwrap();

        drop(tx);

        assert_eq!(journal.len(), 1);
    }
}
