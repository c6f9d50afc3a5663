//! Error types for the loading lifecycle.
//!
//! Every failure the core can report maps onto one variant of
//! [`LoadflowError`]. Adapter seams (artifact store, relational store) have
//! their own error types which are converted with record context attached.

use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::stages::StageId;

/// The main error type for loading lifecycle operations.
#[derive(Debug, Error)]
pub enum LoadflowError {
    /// A required artifact or field is missing or malformed.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
        /// The stage being advanced, if any.
        stage: Option<StageId>,
    },

    /// Role or ownership mismatch.
    #[error("Actor {actor_id} is not authorized: {reason}")]
    Authorization {
        /// The actor that was denied.
        actor_id: Uuid,
        /// Why the guard denied the operation.
        reason: String,
    },

    /// The record is finalized and accepts no further writes.
    #[error("Loading record {record_id} is finalized and accepts no further writes")]
    TerminalState {
        /// The finalized record.
        record_id: Uuid,
    },

    /// The artifact store failed to accept an upload.
    #[error("Upload to bucket '{bucket}' failed for key '{key}': {source}")]
    Upload {
        /// Bucket the upload targeted.
        bucket: String,
        /// Object key of the upload.
        key: String,
        /// Underlying store failure.
        #[source]
        source: ArtifactStoreError,
    },

    /// The relational store failed to read or write.
    #[error("Persistence failure: {source}")]
    Persistence {
        /// The record involved, if known.
        record_id: Option<Uuid>,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A record or ownership link does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The stored record changed since it was read.
    #[error("Loading record {record_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        /// The contended record.
        record_id: Uuid,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Another advance for the same record is still running.
    #[error("An advance is already in progress for loading record {record_id}")]
    AdvanceInProgress {
        /// The busy record.
        record_id: Uuid,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoadflowError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>, stage: Option<StageId>) -> Self {
        Self::Validation {
            message: message.into(),
            stage,
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(actor_id: Uuid, reason: impl Into<String>) -> Self {
        Self::Authorization {
            actor_id,
            reason: reason.into(),
        }
    }

    /// Creates a not-found error for a loading record.
    #[must_use]
    pub fn record_not_found(record_id: Uuid) -> Self {
        Self::NotFound {
            entity: "loading record",
            id: record_id.to_string(),
        }
    }

    /// Converts a store failure for a specific record.
    ///
    /// Version conflicts and missing rows keep their own variants so callers
    /// can tell them apart from backend outages.
    #[must_use]
    pub fn from_store(record_id: Option<Uuid>, err: StoreError) -> Self {
        match (err, record_id) {
            (StoreError::VersionConflict { expected, actual }, Some(record_id)) => Self::Conflict {
                record_id,
                expected,
                actual,
            },
            (StoreError::NotFound(id), _) => Self::record_not_found(id),
            (source, record_id) => Self::Persistence { record_id, source },
        }
    }

    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "LOADING-VALIDATION",
            Self::Authorization { .. } => "LOADING-AUTHZ",
            Self::TerminalState { .. } => "LOADING-TERMINAL",
            Self::Upload { .. } => "LOADING-UPLOAD",
            Self::Persistence { .. } => "LOADING-PERSISTENCE",
            Self::NotFound { .. } => "LOADING-NOT-FOUND",
            Self::Conflict { .. } => "LOADING-CONFLICT",
            Self::AdvanceInProgress { .. } => "LOADING-IN-PROGRESS",
            Self::Config(_) => "LOADING-CONFIG",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::Validation { stage, .. } => {
                if let Some(stage) = stage {
                    map.insert("stage".to_string(), serde_json::json!(stage.get()));
                }
            }
            Self::Authorization { actor_id, reason } => {
                map.insert("actor_id".to_string(), serde_json::json!(actor_id.to_string()));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::TerminalState { record_id } | Self::AdvanceInProgress { record_id } => {
                map.insert("record_id".to_string(), serde_json::json!(record_id.to_string()));
            }
            Self::Upload { bucket, key, .. } => {
                map.insert("bucket".to_string(), serde_json::json!(bucket));
                map.insert("key".to_string(), serde_json::json!(key));
            }
            Self::Persistence { record_id, .. } => {
                if let Some(id) = record_id {
                    map.insert("record_id".to_string(), serde_json::json!(id.to_string()));
                }
            }
            Self::NotFound { entity, id } => {
                map.insert("entity".to_string(), serde_json::json!(entity));
                map.insert("id".to_string(), serde_json::json!(id));
            }
            Self::Conflict {
                record_id,
                expected,
                actual,
            } => {
                map.insert("record_id".to_string(), serde_json::json!(record_id.to_string()));
                map.insert("expected_version".to_string(), serde_json::json!(expected));
                map.insert("actual_version".to_string(), serde_json::json!(actual));
            }
            Self::Config(_) => {}
        }

        map
    }
}

/// Errors reported by an artifact store adapter.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// The store refused the object (size, type, policy).
    #[error("Artifact store rejected the request: {0}")]
    Rejected(String),

    /// The object does not exist.
    #[error("Artifact not found: {bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// Transport or backend failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors reported by the relational store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version differs from the one the write was based on.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// No row with the given id.
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    /// A row with the given id already exists.
    #[error("Record already exists: {0}")]
    Duplicate(Uuid),

    /// A stored row could not be decoded or violates record invariants.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Transport or backend failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = LoadflowError> = std::result::Result<T, E>;
