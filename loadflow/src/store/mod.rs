//! Persistence seam for loading records.

mod memory;
pub mod row;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::{ArmazemId, ClienteId, LoadingRecord};
use crate::errors::StoreError;

pub use memory::InMemoryRecordStore;
pub use row::{from_row, to_row, RecordRow};

/// Server-side filter for listing.
///
/// There is no variant for a missing ownership id: callers without one
/// must not query at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every record.
    All,
    /// Records of one warehouse.
    Warehouse(ArmazemId),
    /// Records of one customer.
    Customer(ClienteId),
}

/// Relational store holding loading records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<LoadingRecord>, StoreError>;

    /// Lists records matching `filter`, newest first.
    async fn list(&self, filter: RecordFilter) -> Result<Vec<LoadingRecord>, StoreError>;

    /// Inserts a new record.
    async fn insert(&self, record: &LoadingRecord) -> Result<(), StoreError>;

    /// Overwrites a record if the stored version equals `expected_version`.
    async fn replace(&self, record: &LoadingRecord, expected_version: u64) -> Result<(), StoreError>;
}
