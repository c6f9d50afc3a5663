//! Per-record guard against duplicate concurrent advances.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{LoadflowError, Result};

/// Records with an advance currently running in this process.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<DashMap<Uuid, Instant>>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `record_id`, failing fast if it is already claimed.
    pub fn try_acquire(&self, record_id: Uuid) -> Result<AdvancePermit> {
        match self.active.entry(record_id) {
            Entry::Occupied(entry) => {
                debug!(
                    record_id = %record_id,
                    running_ms = entry.get().elapsed().as_millis(),
                    "Advance already running"
                );
                Err(LoadflowError::AdvanceInProgress { record_id })
            }
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                Ok(AdvancePermit {
                    active: Arc::clone(&self.active),
                    record_id,
                })
            }
        }
    }

    /// Returns true if `record_id` is claimed.
    #[must_use]
    pub fn is_active(&self, record_id: Uuid) -> bool {
        self.active.contains_key(&record_id)
    }

    /// Number of claimed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Releases its record when dropped.
#[derive(Debug)]
pub struct AdvancePermit {
    active: Arc<DashMap<Uuid, Instant>>,
    record_id: Uuid,
}

impl AdvancePermit {
    /// The claimed record.
    #[must_use]
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }
}

impl Drop for AdvancePermit {
    fn drop(&mut self) {
        self.active.remove(&self.record_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_fails_until_released() {
        let registry = InFlightRegistry::new();
        let id = Uuid::new_v4();

        let permit = registry.try_acquire(id).unwrap();
        assert_eq!(permit.record_id(), id);
        assert!(registry.is_active(id));
        assert!(matches!(
            registry.try_acquire(id),
            Err(LoadflowError::AdvanceInProgress { record_id }) if record_id == id
        ));

        drop(permit);
        assert!(registry.is_empty());
        assert!(registry.try_acquire(id).is_ok());
    }

    #[test]
    fn test_records_are_independent() {
        let registry = InFlightRegistry::new();
        let _a = registry.try_acquire(Uuid::new_v4()).unwrap();
        let _b = registry.try_acquire(Uuid::new_v4()).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
