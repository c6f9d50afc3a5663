//! The stage advance operation.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AdvanceInput, InFlightRegistry};
use crate::artifacts::{artifact_key, ArtifactStore, ArtifactTransaction, CleanupJournal, CompensationReport};
use crate::auth::{AdvanceDecision, AuthorizationContext, ResolvedActor};
use crate::config::ArtifactConfig;
use crate::core::{LoadingRecord, StageCompletion};
use crate::errors::{LoadflowError, Result};
use crate::events::{
    EventSink, NoOpEventSink, ARTIFACT_COMPENSATED, ARTIFACT_ORPHANED, LOADING_ADVANCE_REJECTED,
    LOADING_STAGE_ADVANCED,
};
use crate::observability::{AdvanceSpanAttributes, SpanTimer};
use crate::stages::StageDefinition;
use crate::store::RecordStore;
use crate::utils::{to_storage_precision, Clock, SystemClock};

/// Applies single-stage advances to loading records.
///
/// Each advance runs: guard, input validation, in-flight claim, uploads,
/// one versioned write. Failures after the first upload compensate the
/// uploads before the error is returned.
pub struct LifecycleMachine {
    records: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    journal: Arc<CleanupJournal>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    in_flight: InFlightRegistry,
    config: ArtifactConfig,
}

impl std::fmt::Debug for LifecycleMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleMachine")
            .field("clock", &self.clock)
            .field("in_flight", &self.in_flight.len())
            .field("orphans", &self.journal.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleMachine {
    /// Creates a machine with default config, no events and the system clock.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            records,
            artifacts,
            journal: Arc::new(CleanupJournal::new()),
            events: Arc::new(NoOpEventSink),
            clock: Arc::new(SystemClock),
            in_flight: InFlightRegistry::new(),
            config: ArtifactConfig::default(),
        }
    }

    /// Sets the artifact config.
    #[must_use]
    pub fn with_config(mut self, config: ArtifactConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the orphan journal.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<CleanupJournal>) -> Self {
        self.journal = journal;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares an in-flight registry with other machines.
    #[must_use]
    pub fn with_in_flight(mut self, in_flight: InFlightRegistry) -> Self {
        self.in_flight = in_flight;
        self
    }

    /// The orphan journal.
    #[must_use]
    pub fn journal(&self) -> &Arc<CleanupJournal> {
        &self.journal
    }

    /// The in-flight registry.
    #[must_use]
    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Completes the current stage of `record` and moves it to the next one.
    ///
    /// `record` is the snapshot the caller read. The guard and the update run
    /// against the stored copy; a snapshot whose version differs from the
    /// stored one is a conflict. On any error the stored record is left as
    /// it was.
    pub async fn advance_stage(
        &self,
        snapshot: &LoadingRecord,
        ctx: &AuthorizationContext,
        input: AdvanceInput,
    ) -> Result<LoadingRecord> {
        let timer = SpanTimer::start("loading.advance");
        let stored = self
            .records
            .get(snapshot.id())
            .await
            .map_err(|err| LoadflowError::from_store(Some(snapshot.id()), err))?
            .ok_or_else(|| LoadflowError::record_not_found(snapshot.id()))?;
        let record = &stored;
        let (actor, decision) = ctx.advance_decision(record).await?;

        match decision {
            AdvanceDecision::Allowed => {}
            AdvanceDecision::Denied(reason) => {
                return Err(self.reject(record, &actor, LoadflowError::authorization(actor.id(), reason.to_string())));
            }
            AdvanceDecision::Terminal => {
                return Err(self.reject(
                    record,
                    &actor,
                    LoadflowError::TerminalState { record_id: record.id() },
                ));
            }
        }

        if record.version() != snapshot.version() {
            let err = LoadflowError::Conflict {
                record_id: record.id(),
                expected: snapshot.version(),
                actual: record.version(),
            };
            return Err(self.reject(record, &actor, err));
        }

        let stage = record.current_stage().definition();
        if let Err(err) = input.validate(stage, self.config.max_artifact_bytes) {
            return Err(self.reject(record, &actor, err));
        }

        let _permit = match self.in_flight.try_acquire(record.id()) {
            Ok(permit) => permit,
            Err(err) => return Err(self.reject(record, &actor, err)),
        };

        let mut tx = ArtifactTransaction::begin(Arc::clone(&self.artifacts), Arc::clone(&self.journal), record.id());
        if let Err(err) = self.upload_artifacts(&mut tx, record, stage, &input).await {
            let report = tx.compensate(&format!("upload failed: {err}")).await;
            self.report_compensation(record.id(), &report);
            return Err(self.fail(record, &actor, &timer, err));
        }

        let mut updated = record.clone();
        let completed = updated.complete_current_stage(
            StageCompletion {
                completed_at: to_storage_precision(self.clock.now()),
                observation: input.normalized_observation(),
                artifact_urls: tx.urls(),
                invoice_number: input.normalized_invoice_number(),
            },
            actor.id(),
        );
        let expected = record.version();
        updated.set_version(expected + 1);

        if let Err(source) = self.records.replace(&updated, expected).await {
            let err = LoadflowError::from_store(Some(record.id()), source);
            let report = tx.compensate(&format!("record write failed: {err}")).await;
            self.report_compensation(record.id(), &report);
            return Err(self.fail(record, &actor, &timer, err));
        }
        let kept = tx.commit();

        let duration_ms = timer.finish();
        info!(
            record_id = %updated.id(),
            actor_id = %actor.id(),
            stage = completed.get(),
            next_stage = updated.current_stage().get(),
            artifacts = kept.len(),
            duration_ms,
            "Loading stage advanced"
        );
        self.events.try_emit(
            LOADING_STAGE_ADVANCED,
            Some(json!({
                "record_id": updated.id().to_string(),
                "actor_id": actor.id().to_string(),
                "completed_stage": completed.get(),
                "current_stage": updated.current_stage().get(),
                "artifact_urls": kept.iter().map(|a| a.url.clone()).collect::<Vec<_>>(),
                "version": updated.version(),
                "duration_ms": duration_ms,
            })),
        );

        Ok(updated)
    }

    async fn upload_artifacts(
        &self,
        tx: &mut ArtifactTransaction,
        record: &LoadingRecord,
        stage: &StageDefinition,
        input: &AdvanceInput,
    ) -> Result<()> {
        let Some(kind) = stage.primary_artifact else {
            return Ok(());
        };
        let bucket = self.config.bucket_for(kind);
        let attempt = Uuid::now_v7();

        for payload in [&input.primary_artifact, &input.secondary_artifact].into_iter().flatten() {
            let key = artifact_key(&self.config.key_prefix, record.id(), stage.id, kind, attempt, payload);
            tx.upload(kind, bucket, &key, payload).await?;
        }
        Ok(())
    }

    fn reject(&self, record: &LoadingRecord, actor: &ResolvedActor, err: LoadflowError) -> LoadflowError {
        warn!(
            record_id = %record.id(),
            actor_id = %actor.id(),
            stage = record.current_stage().get(),
            code = err.code(),
            "Advance rejected: {}", err
        );
        self.events.try_emit(
            LOADING_ADVANCE_REJECTED,
            Some(json!({
                "record_id": record.id().to_string(),
                "actor_id": actor.id().to_string(),
                "stage": record.current_stage().get(),
                "code": err.code(),
                "reason": err.to_string(),
            })),
        );
        err
    }

    fn fail(&self, record: &LoadingRecord, actor: &ResolvedActor, timer: &SpanTimer, err: LoadflowError) -> LoadflowError {
        let attrs = AdvanceSpanAttributes::new(record.id().to_string())
            .with_actor(actor.id().to_string())
            .with_stage(record.current_stage().get())
            .with_outcome("failed")
            .with_duration_ms(timer.elapsed_ms())
            .with_error_code(err.code());
        warn!(attributes = ?attrs.to_attributes(), "Advance failed: {}", err);
        err
    }

    fn report_compensation(&self, record_id: Uuid, report: &CompensationReport) {
        for artifact in &report.deleted {
            self.events.try_emit(
                ARTIFACT_COMPENSATED,
                Some(json!({
                    "record_id": record_id.to_string(),
                    "bucket": artifact.bucket,
                    "key": artifact.key,
                })),
            );
        }
        for artifact in &report.orphaned {
            self.events.try_emit(
                ARTIFACT_ORPHANED,
                Some(json!({
                    "record_id": record_id.to_string(),
                    "bucket": artifact.bucket,
                    "key": artifact.key,
                })),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactPayload, InMemoryArtifactStore};
    use crate::events::CollectingEventSink;
    use crate::stages::StageId;
    use crate::store::InMemoryRecordStore;
    use crate::testing::{fixtures, FailingArtifactStore, FailingRecordStore};
    use crate::utils::FixedClock;
    use chrono::Duration;

    struct Harness {
        store: Arc<InMemoryRecordStore>,
        artifacts: Arc<InMemoryArtifactStore>,
        events: Arc<CollectingEventSink>,
        clock: Arc<FixedClock>,
        machine: LifecycleMachine,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryRecordStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::default());
        let events = Arc::new(CollectingEventSink::new());
        let clock = Arc::new(FixedClock::new(fixtures::base_time()));
        let machine = LifecycleMachine::new(store.clone(), artifacts.clone())
            .with_event_sink(events.clone())
            .with_clock(clock.clone());
        Harness {
            store,
            artifacts,
            events,
            clock,
            machine,
        }
    }

    #[tokio::test]
    async fn test_advance_writes_stage_and_version() {
        let h = harness();
        let record = fixtures::record_at(1);
        h.store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);
        h.clock.advance(Duration::minutes(10));

        let updated = h
            .machine
            .advance_stage(&record, &ctx, fixtures::photo_input().with_observation("doca 3"))
            .await
            .unwrap();

        assert_eq!(updated.current_stage().get(), 2);
        assert_eq!(updated.version(), record.version() + 1);
        assert_eq!(updated.completed_at(StageId::ARRIVAL), Some(h.clock.now()));
        let data = updated.stage_data(StageId::ARRIVAL);
        assert_eq!(data.observation.as_deref(), Some("doca 3"));
        assert_eq!(data.artifact_urls.len(), 1);
        assert_eq!(h.artifacts.len(), 1);
        assert_eq!(h.store.get(record.id()).await.unwrap(), Some(updated));
        assert_eq!(h.events.event_types(), vec![LOADING_STAGE_ADVANCED.to_string()]);
    }

    #[tokio::test]
    async fn test_rejection_emits_event_and_uploads_nothing() {
        let h = harness();
        let record = fixtures::record_at(2);
        h.store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);

        let err = h
            .machine
            .advance_stage(&record, &ctx, AdvanceInput::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LOADING-VALIDATION");
        assert!(h.artifacts.is_empty());
        assert_eq!(h.events.event_types(), vec![LOADING_ADVANCE_REJECTED.to_string()]);
    }

    #[tokio::test]
    async fn test_documentation_stage_uploads_pdf_and_xml() {
        let h = harness();
        let record = fixtures::record_at(5);
        h.store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);
        let input = AdvanceInput::new()
            .with_primary_artifact(ArtifactPayload::pdf(b"%PDF-1.7".to_vec()))
            .with_secondary_artifact(ArtifactPayload::xml(b"<nfeProc/>".to_vec()))
            .with_invoice_number(" 000123 ");

        let updated = h.machine.advance_stage(&record, &ctx, input).await.unwrap();

        assert!(updated.is_terminal());
        assert_eq!(updated.invoice_number(), Some("000123"));
        let urls = &updated.stage_data(StageId::DOCUMENTATION).artifact_urls;
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with(".pdf"));
        assert!(urls[1].ends_with(".xml"));
        assert_eq!(h.artifacts.keys("documentos-carregamento").len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_compensates_earlier_uploads() {
        let record = fixtures::record_at(5);
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(&record).await.unwrap();
        let artifacts = Arc::new(FailingArtifactStore::new().with_upload_budget(1).with_working_removes());
        let events = Arc::new(CollectingEventSink::new());
        let machine = LifecycleMachine::new(store.clone(), artifacts.clone()).with_event_sink(events.clone());
        let ctx = fixtures::warehouse_context(&record);
        let input = AdvanceInput::new()
            .with_primary_artifact(ArtifactPayload::pdf(b"%PDF".to_vec()))
            .with_secondary_artifact(ArtifactPayload::xml(b"<x/>".to_vec()));

        let err = machine.advance_stage(&record, &ctx, input).await.unwrap_err();

        assert_eq!(err.code(), "LOADING-UPLOAD");
        assert_eq!(artifacts.stored(), 0);
        assert_eq!(store.get(record.id()).await.unwrap(), Some(record));
        assert_eq!(events.events_of_type(ARTIFACT_COMPENSATED).len(), 1);
        assert!(machine.journal().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_deletes_uploads() {
        let record = fixtures::record_at(1);
        let store = Arc::new(FailingRecordStore::new());
        store.inner().insert(&record).await.unwrap();
        let artifacts = Arc::new(InMemoryArtifactStore::default());
        let machine = LifecycleMachine::new(store.clone(), artifacts.clone());
        let ctx = fixtures::warehouse_context(&record);

        let err = machine
            .advance_stage(&record, &ctx, fixtures::photo_input())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LOADING-PERSISTENCE");
        assert!(artifacts.is_empty());
        assert!(machine.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_permit_released_after_success() {
        let h = harness();
        let record = fixtures::record_at(1);
        h.store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);

        h.machine
            .advance_stage(&record, &ctx, fixtures::photo_input())
            .await
            .unwrap();

        assert!(h.machine.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_record_is_rejected_in_progress() {
        let h = harness();
        let record = fixtures::record_at(1);
        h.store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);
        let _held = h.machine.in_flight().try_acquire(record.id()).unwrap();

        let err = h
            .machine
            .advance_stage(&record, &ctx, fixtures::photo_input())
            .await
            .unwrap_err();

        assert!(matches!(err, LoadflowError::AdvanceInProgress { .. }));
        assert!(h.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_forged_snapshot_cannot_move_record() {
        let h = harness();
        let record = fixtures::record_at(1);
        h.store.insert(&record).await.unwrap();

        let mut value = serde_json::to_value(&record).unwrap();
        value["schedule"]["armazem_id"] = json!(Uuid::new_v4());
        let forged: LoadingRecord = serde_json::from_value(value).unwrap();
        assert_ne!(forged.armazem_id(), record.armazem_id());
        let ctx = fixtures::warehouse_context(&forged);

        let err = h
            .machine
            .advance_stage(&forged, &ctx, fixtures::photo_input())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LOADING-AUTHZ");
        assert_eq!(h.store.get(record.id()).await.unwrap(), Some(record));
        assert!(h.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_snapshot_is_not_found() {
        let h = harness();
        let record = fixtures::record_at(1);
        let ctx = fixtures::warehouse_context(&record);

        let err = h
            .machine
            .advance_stage(&record, &ctx, fixtures::photo_input())
            .await
            .unwrap_err();

        assert!(matches!(err, LoadflowError::NotFound { .. }));
        assert!(h.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_returned_record_matches_store_with_system_clock() {
        let store = Arc::new(InMemoryRecordStore::new());
        let machine = LifecycleMachine::new(store.clone(), Arc::new(InMemoryArtifactStore::default()));
        let record = fixtures::record_at(1);
        store.insert(&record).await.unwrap();
        let ctx = fixtures::warehouse_context(&record);

        let updated = machine
            .advance_stage(&record, &ctx, fixtures::photo_input())
            .await
            .unwrap();

        assert_eq!(store.get(record.id()).await.unwrap(), Some(updated));
    }
}
