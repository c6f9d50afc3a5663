//! Testing utilities for the loading lifecycle.
//!
//! This module provides:
//! - Record, input and session fixtures
//! - Artifact and record stores that fail on demand

pub mod fixtures;
mod mocks;

pub use mocks::{FailingArtifactStore, FailingRecordStore};
