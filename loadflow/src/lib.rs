//! # Loadflow
//!
//! Shipment loading lifecycle for warehouse operations.
//!
//! A loading record follows one truck through six stages, from arrival to
//! finalization. Loadflow provides:
//!
//! - **Stage registry**: the six stages and the artifacts each one collects
//! - **Authorization**: closed roles, ownership bindings and a per-session
//!   [`auth::AuthorizationContext`]
//! - **Lifecycle machine**: single-step advances with compensable uploads and
//!   optimistic concurrency
//! - **Statistics**: elapsed, per-stage and total durations
//! - **Scoped queries**: listings that never run unfiltered for scoped roles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use loadflow::prelude::*;
//!
//! let service = LoadingService::new(records, artifacts)
//!     .with_event_sink(Arc::new(LoggingEventSink::debug()));
//!
//! let record = service.create_from_schedule(&staff_ctx, schedule).await?;
//! let record = service.advance_stage(&operator_ctx, record.id(), input).await?;
//! let timings = service.timings(&staff_ctx, record.id()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod query;
pub mod service;
pub mod stages;
pub mod stats;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{ArtifactPayload, ArtifactStore, CleanupJournal, InMemoryArtifactStore};
    pub use crate::auth::{
        Action, Actor, AuthorizationContext, OwnershipDirectory, PermissionMatrix, PermissionSource,
        ResolvedActor, Role, RoleSet,
    };
    pub use crate::config::{ArtifactConfig, LoadflowConfig, LoggingConfig};
    pub use crate::core::{ArmazemId, ClienteId, LoadingRecord, ScheduleRef, StageData};
    pub use crate::errors::{LoadflowError, Result};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::lifecycle::{AdvanceInput, LifecycleMachine};
    pub use crate::query::{Listing, RecordQuery, VisibilityScope};
    pub use crate::service::LoadingService;
    pub use crate::stages::{ArtifactKind, StageDefinition, StageId};
    pub use crate::stats::{compute_timings, format_duration, StageTimings};
    pub use crate::store::{InMemoryRecordStore, RecordFilter, RecordStore};
    pub use crate::utils::{Clock, SystemClock, Timestamp};
}
