//! Loading service facade.
//!
//! Wires the stores, clock, event sink and lifecycle machine behind the
//! operations a UI or API layer calls.

use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::artifacts::{ArtifactStore, CleanupJournal, SweepReport};
use crate::auth::{Action, AuthorizationContext, RESOURCE_LOADINGS};
use crate::config::LoadflowConfig;
use crate::core::{LoadingRecord, ScheduleRef};
use crate::errors::{LoadflowError, Result};
use crate::events::{EventSink, NoOpEventSink, LOADING_CREATED};
use crate::lifecycle::{AdvanceInput, InFlightRegistry, LifecycleMachine};
use crate::query::{Listing, RecordQuery};
use crate::stats::{compute_timings, StageTimings};
use crate::store::RecordStore;
use crate::utils::{to_storage_precision, Clock, SystemClock};

/// Entry point for loading record operations.
pub struct LoadingService {
    config: LoadflowConfig,
    records: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    journal: Arc<CleanupJournal>,
    in_flight: InFlightRegistry,
    machine: LifecycleMachine,
}

impl std::fmt::Debug for LoadingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingService")
            .field("config", &self.config)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl LoadingService {
    /// Creates a service with default config, the system clock and no events.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let mut service = Self {
            config: LoadflowConfig::default(),
            records: Arc::clone(&records),
            artifacts: Arc::clone(&artifacts),
            events: Arc::new(NoOpEventSink),
            clock: Arc::new(SystemClock),
            journal: Arc::new(CleanupJournal::new()),
            in_flight: InFlightRegistry::new(),
            machine: LifecycleMachine::new(records, artifacts),
        };
        service.rebuild_machine();
        service
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: LoadflowConfig) -> Self {
        self.config = config;
        self.rebuild_machine();
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self.rebuild_machine();
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild_machine();
        self
    }

    fn rebuild_machine(&mut self) {
        self.machine = LifecycleMachine::new(Arc::clone(&self.records), Arc::clone(&self.artifacts))
            .with_config(self.config.artifacts.clone())
            .with_journal(Arc::clone(&self.journal))
            .with_event_sink(Arc::clone(&self.events))
            .with_clock(Arc::clone(&self.clock))
            .with_in_flight(self.in_flight.clone());
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LoadflowConfig {
        &self.config
    }

    /// Artifacts awaiting a sweep.
    #[must_use]
    pub fn journal(&self) -> &Arc<CleanupJournal> {
        &self.journal
    }

    /// Creates a stage-1 record for an accepted schedule entry.
    pub async fn create_from_schedule(&self, ctx: &AuthorizationContext, schedule: ScheduleRef) -> Result<LoadingRecord> {
        let actor = ctx.resolved_actor().await?;
        if !ctx.can_access_resource(RESOURCE_LOADINGS, Action::Create).await? {
            return Err(LoadflowError::authorization(
                actor.id(),
                format!("no create access to {RESOURCE_LOADINGS}"),
            ));
        }

        let record = LoadingRecord::from_schedule(schedule, to_storage_precision(self.clock.now()))?;
        self.records
            .insert(&record)
            .await
            .map_err(|err| LoadflowError::from_store(Some(record.id()), err))?;

        info!(
            record_id = %record.id(),
            armazem_id = %record.armazem_id(),
            cliente_id = %record.cliente_id(),
            actor_id = %actor.id(),
            "Loading record created"
        );
        self.events.try_emit(
            LOADING_CREATED,
            Some(json!({
                "record_id": record.id().to_string(),
                "schedule_id": record.schedule().schedule_id.to_string(),
                "armazem_id": record.armazem_id().to_string(),
                "cliente_id": record.cliente_id().to_string(),
            })),
        );
        Ok(record)
    }

    /// Loads the record and advances it one stage.
    pub async fn advance_stage(
        &self,
        ctx: &AuthorizationContext,
        record_id: Uuid,
        input: AdvanceInput,
    ) -> Result<LoadingRecord> {
        let record = self
            .records
            .get(record_id)
            .await
            .map_err(|err| LoadflowError::from_store(Some(record_id), err))?
            .ok_or_else(|| LoadflowError::record_not_found(record_id))?;
        self.machine.advance_stage(&record, ctx, input).await
    }

    /// Records visible to the session.
    pub async fn list_visible(&self, ctx: &AuthorizationContext) -> Result<Vec<LoadingRecord>> {
        RecordQuery::list_visible(ctx, self.records.as_ref()).await
    }

    /// Non-blocking listing; pending while ownership resolves.
    pub async fn try_list_visible(&self, ctx: &AuthorizationContext) -> Result<Listing> {
        RecordQuery::try_list_visible(ctx, self.records.as_ref()).await
    }

    /// One visible record.
    pub async fn get_visible(&self, ctx: &AuthorizationContext, record_id: Uuid) -> Result<LoadingRecord> {
        RecordQuery::get_visible(ctx, self.records.as_ref(), record_id).await
    }

    /// Timing statistics of a visible record as of now.
    pub async fn timings(&self, ctx: &AuthorizationContext, record_id: Uuid) -> Result<StageTimings> {
        let record = self.get_visible(ctx, record_id).await?;
        Ok(compute_timings(&record, self.clock.now()))
    }

    /// Retries deletion of every journaled orphan once.
    pub async fn sweep_orphans(&self) -> SweepReport {
        self.journal.sweep(self.artifacts.as_ref()).await
    }
}
