//! Lifecycle events.
//!
//! Event types are dotted strings; payloads are JSON objects carrying at
//! least `record_id`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A loading record was created from a schedule entry.
pub const LOADING_CREATED: &str = "loading.created";

/// A stage was completed and the record moved forward.
pub const LOADING_STAGE_ADVANCED: &str = "loading.stage_advanced";

/// An advance was refused by the guard or by validation.
pub const LOADING_ADVANCE_REJECTED: &str = "loading.advance_rejected";

/// Uploaded artifacts were deleted after a failed advance.
pub const ARTIFACT_COMPENSATED: &str = "artifact.compensated";

/// A compensating delete failed and the artifact was journaled.
pub const ARTIFACT_ORPHANED: &str = "artifact.orphaned";

fn is_warning(event_type: &str) -> bool {
    event_type == LOADING_ADVANCE_REJECTED || event_type == ARTIFACT_ORPHANED
}
