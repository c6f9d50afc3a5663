//! In-memory record store keeping rows in the relational column layout.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::row::{from_row, to_row, RecordRow, COL_VERSION};
use super::{RecordFilter, RecordStore};
use crate::core::LoadingRecord;
use crate::errors::StoreError;

/// Record store backed by a map of rows.
///
/// Every read decodes the stored row, so invariant violations surface the
/// same way they would from a real database.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<HashMap<Uuid, RecordRow>>,
    list_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `list` queries served.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Raw row for a record.
    #[must_use]
    pub fn row(&self, id: Uuid) -> Option<RecordRow> {
        self.rows.read().get(&id).cloned()
    }

    /// Overwrites a raw row, bypassing version checks.
    pub fn put_row(&self, id: Uuid, row: RecordRow) {
        self.rows.write().insert(id, row);
    }
}

fn stored_version(row: &RecordRow) -> Result<u64, StoreError> {
    row.get(COL_VERSION)
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::Corrupt(format!("column '{COL_VERSION}' missing")))
}

fn matches_filter(record: &LoadingRecord, filter: RecordFilter) -> bool {
    match filter {
        RecordFilter::All => true,
        RecordFilter::Warehouse(id) => record.armazem_id() == id,
        RecordFilter::Customer(id) => record.cliente_id() == id,
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: Uuid) -> Result<Option<LoadingRecord>, StoreError> {
        let row = self.rows.read().get(&id).cloned();
        row.as_ref().map(from_row).transpose()
    }

    async fn list(&self, filter: RecordFilter) -> Result<Vec<LoadingRecord>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<RecordRow> = self.rows.read().values().cloned().collect();

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = from_row(row)?;
            if matches_filter(&record, filter) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(&b.id())));
        Ok(records)
    }

    async fn insert(&self, record: &LoadingRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&record.id()) {
            return Err(StoreError::Duplicate(record.id()));
        }
        rows.insert(record.id(), to_row(record));
        Ok(())
    }

    async fn replace(&self, record: &LoadingRecord, expected_version: u64) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        let current = rows.get(&record.id()).ok_or(StoreError::NotFound(record.id()))?;
        let actual = stored_version(current)?;
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }
        rows.insert(record.id(), to_row(record));
        Ok(())
    }
}
