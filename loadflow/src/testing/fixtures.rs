//! Ready-made records, inputs and authorization contexts.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::artifacts::ArtifactPayload;
use crate::auth::{
    Actor, AuthorizationContext, InMemoryOwnershipDirectory, PermissionMatrix, ResourcePermissions, Role,
    StaticPermissionSource, RESOURCE_LOADINGS,
};
use crate::core::{ArmazemId, ClienteId, LoadingRecord, ScheduleRef, StageCompletion};
use crate::lifecycle::AdvanceInput;
use crate::stages::StageId;
use crate::utils::Timestamp;

/// Minutes between consecutive stage completions in [`record_at`].
pub const STAGE_SPACING_MINUTES: i64 = 30;

/// 2024-03-01 08:00:00 UTC.
#[must_use]
pub fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A valid schedule entry for a fresh warehouse and customer.
#[must_use]
pub fn schedule() -> ScheduleRef {
    ScheduleRef::new(ClienteId::new_v4(), ArmazemId::new_v4(), "ABC1D23", "Maria Souza", 32.0)
        .with_driver_document("123.456.789-00")
        .with_internal_order_number("PED-1001")
}

/// A record created at [`base_time`] and advanced to `stage`.
///
/// Stage `k` is completed at `base_time + k * 30min`; the version equals the
/// number of completed stages.
///
/// # Panics
///
/// Panics if `stage` is outside `1..=6`.
#[must_use]
pub fn record_at(stage: u8) -> LoadingRecord {
    record_for(schedule(), stage)
}

/// Like [`record_at`] for a given schedule.
///
/// # Panics
///
/// Panics if `stage` is outside `1..=6`.
#[must_use]
pub fn record_for(schedule: ScheduleRef, stage: u8) -> LoadingRecord {
    let Some(target) = StageId::new(stage) else {
        panic!("stage {stage} is outside 1..=6");
    };
    let mut record = match LoadingRecord::from_schedule(schedule, base_time()) {
        Ok(record) => record,
        Err(err) => panic!("fixture schedule rejected: {err}"),
    };
    let operator = Uuid::new_v4();

    while record.current_stage() < target {
        let current = record.current_stage();
        let def = current.definition();
        let artifact_urls = def
            .artifact_fields
            .iter()
            .map(|field| format!("memory://artifacts/{}/{field}", record.id()))
            .collect();
        let invoice_number = (current == StageId::DOCUMENTATION).then(|| "000123".to_string());
        record.complete_current_stage(
            StageCompletion {
                completed_at: base_time() + Duration::minutes(STAGE_SPACING_MINUTES * i64::from(current.get())),
                observation: None,
                artifact_urls,
                invoice_number,
            },
            operator,
        );
        record.set_version(record.version() + 1);
    }
    record
}

/// A JPEG photo input.
#[must_use]
pub fn photo_input() -> AdvanceInput {
    AdvanceInput::new().with_primary_artifact(ArtifactPayload::jpeg(vec![0xff, 0xd8, 0xff, 0xe0]))
}

/// An invoice PDF input without XML.
#[must_use]
pub fn document_input() -> AdvanceInput {
    AdvanceInput::new().with_primary_artifact(ArtifactPayload::pdf(b"%PDF-1.7".to_vec()))
}

/// The input a stage expects: a photo for stages 1-4, a PDF for stage 5.
#[must_use]
pub fn input_for(stage: StageId) -> AdvanceInput {
    if stage == StageId::DOCUMENTATION {
        document_input()
    } else {
        photo_input()
    }
}

/// The permission rows of a standard installation.
#[must_use]
pub fn default_permissions() -> PermissionMatrix {
    PermissionMatrix::new()
        .grant(Role::Admin, RESOURCE_LOADINGS, ResourcePermissions::full())
        .grant(Role::Logistica, RESOURCE_LOADINGS, ResourcePermissions::full())
        .grant(
            Role::Armazem,
            RESOURCE_LOADINGS,
            ResourcePermissions {
                can_create: false,
                can_read: true,
                can_update: true,
                can_delete: false,
            },
        )
        .grant(Role::Cliente, RESOURCE_LOADINGS, ResourcePermissions::read_only())
}

/// A context over `directory` with [`default_permissions`].
#[must_use]
pub fn context_with(actor: Actor, directory: Arc<InMemoryOwnershipDirectory>) -> AuthorizationContext {
    AuthorizationContext::new(
        actor,
        directory,
        Arc::new(StaticPermissionSource::new(default_permissions())),
    )
}

/// A warehouse operator linked to `armazem_id`.
#[must_use]
pub fn warehouse_operator(armazem_id: ArmazemId) -> AuthorizationContext {
    let directory = Arc::new(InMemoryOwnershipDirectory::new());
    let actor = Actor::new(Uuid::new_v4(), [Role::Armazem]);
    directory.link_warehouse(actor.id, armazem_id);
    context_with(actor, directory)
}

/// A warehouse operator of the record's warehouse.
#[must_use]
pub fn warehouse_context(record: &LoadingRecord) -> AuthorizationContext {
    warehouse_operator(record.armazem_id())
}

/// A customer user linked to `cliente_id`.
#[must_use]
pub fn customer_context(cliente_id: ClienteId) -> AuthorizationContext {
    let directory = Arc::new(InMemoryOwnershipDirectory::new());
    let actor = Actor::new(Uuid::new_v4(), [Role::Cliente]);
    directory.link_customer(actor.id, cliente_id);
    context_with(actor, directory)
}

/// A user holding only `role`, with no ownership links.
#[must_use]
pub fn role_context(role: Role) -> AuthorizationContext {
    context_with(
        Actor::new(Uuid::new_v4(), [role]),
        Arc::new(InMemoryOwnershipDirectory::new()),
    )
}
