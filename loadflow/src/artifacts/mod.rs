//! Artifact storage for stage photos and fiscal documents.
//!
//! This module provides:
//! - [`ArtifactStore`]: the blob storage seam
//! - [`ArtifactPayload`] and [`artifact_key`]: what is stored and where
//! - [`ArtifactTransaction`]: compensable uploads for one record write
//! - [`CleanupJournal`]: orphans awaiting an explicit sweep

#[cfg(feature = "http-artifacts")]
mod http;
mod journal;
mod payload;
mod store;
mod transaction;

#[cfg(feature = "http-artifacts")]
pub use http::HttpArtifactStore;
pub use journal::{CleanupJournal, OrphanedArtifact, SweepReport};
pub use payload::{artifact_key, ArtifactPayload};
pub use store::{ArtifactStore, InMemoryArtifactStore, StoredObject};
pub use transaction::{ArtifactTransaction, CompensationReport, UploadedArtifact};
