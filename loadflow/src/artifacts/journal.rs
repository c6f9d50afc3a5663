//! Ledger of artifacts whose compensating delete failed.
//!
//! Entries are only removed by an explicit [`CleanupJournal::sweep`].

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::ArtifactStore;
use crate::errors::ArtifactStoreError;
use crate::utils::{now_utc, Timestamp};

/// An uploaded object no record points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedArtifact {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Record whose advance uploaded it.
    pub record_id: Uuid,
    /// Why the object could not be removed.
    pub reason: String,
    /// When it was journaled.
    pub recorded_at: Timestamp,
}

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Objects deleted (or already gone).
    pub removed: usize,
    /// Objects that still could not be deleted.
    pub remaining: usize,
}

/// In-process orphan ledger.
#[derive(Debug, Default)]
pub struct CleanupJournal {
    entries: RwLock<Vec<OrphanedArtifact>>,
}

impl CleanupJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an orphan.
    pub fn record(&self, bucket: &str, key: &str, record_id: Uuid, reason: impl Into<String>) {
        let orphan = OrphanedArtifact {
            bucket: bucket.to_string(),
            key: key.to_string(),
            record_id,
            reason: reason.into(),
            recorded_at: now_utc(),
        };
        warn!(
            bucket = %orphan.bucket,
            key = %orphan.key,
            record_id = %record_id,
            reason = %orphan.reason,
            "Artifact orphaned"
        );
        self.entries.write().push(orphan);
    }

    /// Current orphans, oldest first.
    #[must_use]
    pub fn orphans(&self) -> Vec<OrphanedArtifact> {
        self.entries.read().clone()
    }

    /// Orphans belonging to one record.
    #[must_use]
    pub fn orphans_for(&self, record_id: Uuid) -> Vec<OrphanedArtifact> {
        self.entries
            .read()
            .iter()
            .filter(|o| o.record_id == record_id)
            .cloned()
            .collect()
    }

    /// Number of orphans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if there are no orphans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Attempts to delete every journaled object once, concurrently.
    ///
    /// Objects already missing from the store count as removed. Failures stay
    /// in the journal; nothing is retried within the sweep.
    pub async fn sweep(&self, store: &dyn ArtifactStore) -> SweepReport {
        let snapshot = self.orphans();
        let outcomes = join_all(
            snapshot
                .iter()
                .map(|orphan| async move { (orphan, store.remove(&orphan.bucket, &orphan.key).await) }),
        )
        .await;

        let mut removed = HashSet::new();
        for (orphan, outcome) in outcomes {
            match outcome {
                Ok(()) | Err(ArtifactStoreError::NotFound { .. }) => {
                    removed.insert((orphan.bucket.clone(), orphan.key.clone()));
                }
                Err(err) => {
                    warn!(bucket = %orphan.bucket, key = %orphan.key, error = %err, "Sweep could not delete artifact");
                }
            }
        }

        let remaining = {
            let mut entries = self.entries.write();
            entries.retain(|o| !removed.contains(&(o.bucket.clone(), o.key.clone())));
            entries.len()
        };

        let report = SweepReport {
            removed: removed.len(),
            remaining,
        };
        info!(removed = report.removed, remaining = report.remaining, "Orphan sweep finished");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactPayload, InMemoryArtifactStore};
    use crate::testing::FailingArtifactStore;

    #[tokio::test]
    async fn test_sweep_removes_and_tolerates_missing() {
        let store = InMemoryArtifactStore::default();
        store.upload("fotos", "a.jpg", &ArtifactPayload::jpeg(vec![1])).await.unwrap();

        let journal = CleanupJournal::new();
        let record_id = Uuid::new_v4();
        journal.record("fotos", "a.jpg", record_id, "delete timed out");
        journal.record("fotos", "gone.jpg", record_id, "delete timed out");
        assert_eq!(journal.orphans_for(record_id).len(), 2);

        let report = journal.sweep(&store).await;

        assert_eq!(report, SweepReport { removed: 2, remaining: 0 });
        assert!(journal.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_keeps_failures() {
        let journal = CleanupJournal::new();
        journal.record("fotos", "a.jpg", Uuid::new_v4(), "delete refused");

        let report = tokio_test::block_on(journal.sweep(&FailingArtifactStore::new()));

        assert_eq!(report.removed, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(journal.len(), 1);
    }
}
