//! Core domain types: loading records, schedule references and ids.

mod ids;
mod record;
mod schedule;

pub use ids::{ArmazemId, ClienteId};
pub(crate) use record::StageCompletion;
pub use record::{InvariantViolation, LoadingRecord, StageData, StageProgress};
pub use schedule::ScheduleRef;
