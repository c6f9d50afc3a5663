//! Loading record and per-stage data.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{ArmazemId, ClienteId, ScheduleRef};
use crate::errors::Result;
use crate::stages::StageId;
use crate::utils::Timestamp;

/// Data captured when a stage is completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageData {
    /// When the stage was left. `None` until then.
    pub completed_at: Option<Timestamp>,
    /// Free-text observation typed by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// URLs of the uploaded artifacts, primary first.
    #[serde(default)]
    pub artifact_urls: Vec<String>,
}

impl StageData {
    /// Returns true once the stage has been left.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Where a stage sits relative to the record's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageProgress {
    /// Already left.
    Completed,
    /// The stage the record is in.
    Current,
    /// Not reached yet.
    Pending,
}

impl fmt::Display for StageProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Current => write!(f, "current"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// A record failed its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("loading record {record_id} violates invariant: {message}")]
pub struct InvariantViolation {
    /// The offending record.
    pub record_id: Uuid,
    /// Which invariant failed.
    pub message: String,
}

/// Values written when the current stage is completed.
#[derive(Debug, Clone)]
pub(crate) struct StageCompletion {
    pub completed_at: Timestamp,
    pub observation: Option<String>,
    pub artifact_urls: Vec<String>,
    pub invoice_number: Option<String>,
}

/// One truck being loaded, from arrival to finalization.
///
/// Fields are private: warehouse and customer come from the schedule and
/// cannot be changed, and stage data is only written through the lifecycle
/// machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLoadingRecord")]
pub struct LoadingRecord {
    id: Uuid,
    schedule: ScheduleRef,
    current_stage: StageId,
    stage_data: [StageData; 6],
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_by: Option<Uuid>,
    version: u64,
    created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<Timestamp>,
}

/// Wire form of [`LoadingRecord`]; only converted through `from_parts`.
#[derive(Deserialize)]
struct RawLoadingRecord {
    id: Uuid,
    schedule: ScheduleRef,
    current_stage: StageId,
    stage_data: [StageData; 6],
    #[serde(default)]
    invoice_number: Option<String>,
    #[serde(default)]
    updated_by: Option<Uuid>,
    #[serde(default)]
    version: u64,
    created_at: Timestamp,
    #[serde(default)]
    updated_at: Option<Timestamp>,
}

impl TryFrom<RawLoadingRecord> for LoadingRecord {
    type Error = InvariantViolation;

    fn try_from(raw: RawLoadingRecord) -> std::result::Result<Self, Self::Error> {
        Self::from_parts(
            raw.id,
            raw.schedule,
            raw.current_stage,
            raw.stage_data,
            raw.invoice_number,
            raw.updated_by,
            raw.version,
            raw.created_at,
            raw.updated_at,
        )
    }
}

impl LoadingRecord {
    /// Creates a record at stage 1 for an accepted schedule entry.
    pub fn from_schedule(schedule: ScheduleRef, created_at: Timestamp) -> Result<Self> {
        schedule.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            schedule,
            current_stage: StageId::ARRIVAL,
            stage_data: Default::default(),
            invoice_number: None,
            updated_by: None,
            version: 0,
            created_at,
            updated_at: None,
        })
    }

    /// Rebuilds a record from stored values and checks its invariants.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: Uuid,
        schedule: ScheduleRef,
        current_stage: StageId,
        stage_data: [StageData; 6],
        invoice_number: Option<String>,
        updated_by: Option<Uuid>,
        version: u64,
        created_at: Timestamp,
        updated_at: Option<Timestamp>,
    ) -> std::result::Result<Self, InvariantViolation> {
        let record = Self {
            id,
            schedule,
            current_stage,
            stage_data,
            invoice_number,
            updated_by,
            version,
            created_at,
            updated_at,
        };
        record.check_invariants()?;
        Ok(record)
    }

    /// Record id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The schedule entry this record was created from.
    #[must_use]
    pub fn schedule(&self) -> &ScheduleRef {
        &self.schedule
    }

    /// Warehouse inherited from the schedule.
    #[must_use]
    pub fn armazem_id(&self) -> ArmazemId {
        self.schedule.armazem_id
    }

    /// Customer inherited from the schedule.
    #[must_use]
    pub fn cliente_id(&self) -> ClienteId {
        self.schedule.cliente_id
    }

    /// The stage the record is currently in.
    #[must_use]
    pub fn current_stage(&self) -> StageId {
        self.current_stage
    }

    /// Returns true once the record reached the finalized stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }

    /// Data captured for a stage.
    #[must_use]
    pub fn stage_data(&self, stage: StageId) -> &StageData {
        &self.stage_data[usize::from(stage.get() - 1)]
    }

    /// Iterates over every stage with its data, in order.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &StageData)> {
        StageId::all().zip(self.stage_data.iter())
    }

    /// Completion timestamp of a stage, if it was left.
    #[must_use]
    pub fn completed_at(&self, stage: StageId) -> Option<Timestamp> {
        self.stage_data(stage).completed_at
    }

    /// Invoice number captured during documentation.
    #[must_use]
    pub fn invoice_number(&self) -> Option<&str> {
        self.invoice_number.as_deref()
    }

    /// Actor that performed the last write.
    #[must_use]
    pub fn updated_by(&self) -> Option<Uuid> {
        self.updated_by
    }

    /// Optimistic-concurrency version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last write.
    #[must_use]
    pub fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    /// Classifies a stage relative to the current stage.
    #[must_use]
    pub fn progress_of(&self, stage: StageId) -> StageProgress {
        match stage.cmp(&self.current_stage) {
            std::cmp::Ordering::Less => StageProgress::Completed,
            std::cmp::Ordering::Equal => StageProgress::Current,
            std::cmp::Ordering::Greater => StageProgress::Pending,
        }
    }

    /// Progress of every stage, in order.
    #[must_use]
    pub fn progress(&self) -> Vec<(StageId, StageProgress)> {
        StageId::all().map(|s| (s, self.progress_of(s))).collect()
    }

    /// Verifies the structural invariants of the record.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
        for (stage, data) in self.stages() {
            let should_be_completed = stage < self.current_stage;
            if data.is_completed() != should_be_completed {
                return Err(self.violation(format!(
                    "stage {stage} completion is {} while current stage is {}",
                    data.is_completed(),
                    self.current_stage
                )));
            }
            let max = stage.definition().max_artifacts();
            if data.artifact_urls.len() > max {
                return Err(self.violation(format!(
                    "stage {stage} holds {} artifacts, at most {max} allowed",
                    data.artifact_urls.len()
                )));
            }
        }

        let finalized = self.stage_data(StageId::FINALIZED);
        if finalized.observation.is_some() || !finalized.artifact_urls.is_empty() {
            return Err(self.violation("finalized stage carries data".to_string()));
        }

        Ok(())
    }

    fn violation(&self, message: String) -> InvariantViolation {
        InvariantViolation {
            record_id: self.id,
            message,
        }
    }

    /// Completes the current stage and moves to the next one.
    ///
    /// Callers must have checked that the record is not terminal.
    pub(crate) fn complete_current_stage(&mut self, completion: StageCompletion, actor: Uuid) -> StageId {
        let completed = self.current_stage;
        let Some(next) = completed.next() else {
            return completed;
        };

        let data = &mut self.stage_data[usize::from(completed.get() - 1)];
        data.completed_at = Some(completion.completed_at);
        if completion.observation.is_some() {
            data.observation = completion.observation;
        }
        data.artifact_urls = completion.artifact_urls;

        if completion.invoice_number.is_some() {
            self.invoice_number = completion.invoice_number;
        }
        self.current_stage = next;
        self.updated_by = Some(actor);
        self.updated_at = Some(completion.completed_at);
        completed
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record() -> LoadingRecord {
        let schedule = ScheduleRef::new(
            ClienteId::new_v4(),
            ArmazemId::new_v4(),
            "ABC1D23",
            "Maria Souza",
            28.0,
        );
        LoadingRecord::from_schedule(schedule, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()).unwrap()
    }

    fn completion(at: Timestamp) -> StageCompletion {
        StageCompletion {
            completed_at: at,
            observation: None,
            artifact_urls: vec!["memory://fotos/1.jpg".to_string()],
            invoice_number: None,
        }
    }

    #[test]
    fn test_new_record_starts_at_arrival() {
        let record = record();
        assert_eq!(record.current_stage(), StageId::ARRIVAL);
        assert_eq!(record.version(), 0);
        assert!(record.stages().all(|(_, d)| !d.is_completed()));
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn test_ownership_is_inherited_from_schedule() {
        let record = record();
        assert_eq!(record.armazem_id(), record.schedule().armazem_id);
        assert_eq!(record.cliente_id(), record.schedule().cliente_id);
    }

    #[test]
    fn test_from_schedule_rejects_invalid_entry() {
        let schedule = ScheduleRef::new(ClienteId::new_v4(), ArmazemId::new_v4(), "???", "Ana", 1.0);
        assert!(LoadingRecord::from_schedule(schedule, Utc::now()).is_err());
    }

    #[test]
    fn test_complete_current_stage_advances_by_one() {
        let mut record = record();
        let actor = Uuid::new_v4();
        let at = record.created_at() + Duration::minutes(5);

        let completed = record.complete_current_stage(completion(at), actor);

        assert_eq!(completed, StageId::ARRIVAL);
        assert_eq!(record.current_stage().get(), 2);
        assert_eq!(record.completed_at(StageId::ARRIVAL), Some(at));
        assert_eq!(record.updated_by(), Some(actor));
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn test_observation_keeps_existing_when_absent() {
        let mut record = record();
        record.stage_data[0].observation = Some("chegou cedo".to_string());
        record.complete_current_stage(completion(Utc::now()), Uuid::new_v4());
        assert_eq!(
            record.stage_data(StageId::ARRIVAL).observation.as_deref(),
            Some("chegou cedo")
        );
    }

    #[test]
    fn test_progress_classification() {
        let mut record = record();
        record.complete_current_stage(completion(Utc::now()), Uuid::new_v4());
        let progress = record.progress();
        assert_eq!(progress[0].1, StageProgress::Completed);
        assert_eq!(progress[1].1, StageProgress::Current);
        assert_eq!(progress[5].1, StageProgress::Pending);
    }

    #[test]
    fn test_invariant_detects_missing_timestamp() {
        let mut record = record();
        record.current_stage = StageId::new(3).unwrap();
        let err = record.check_invariants().unwrap_err();
        assert!(err.message.contains("stage 1"));
    }

    #[test]
    fn test_serde_roundtrip_preserves_stage_data() {
        let mut record = record();
        record.complete_current_stage(completion(Utc::now()), Uuid::new_v4());
        let json = serde_json::to_string(&record).unwrap();
        let restored: LoadingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn test_deserialize_rejects_broken_invariants() {
        let mut record = record();
        record.complete_current_stage(completion(Utc::now()), Uuid::new_v4());
        let mut value = serde_json::to_value(&record).unwrap();
        value["current_stage"] = serde_json::json!(3);

        let err = serde_json::from_value::<LoadingRecord>(value).unwrap_err();
        assert!(err.to_string().contains("violates invariant"));
    }
}
