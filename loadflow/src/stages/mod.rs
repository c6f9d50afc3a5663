//! Stage registry.
//!
//! The six loading stages are defined once here so no other module has to
//! hard-code stage numbers.

mod registry;

pub use registry::{all_stages, stage_by_id, ArtifactKind, StageDefinition, StageId};
