//! Mapping between [`LoadingRecord`] and the `carregamentos` column layout.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::core::{ArmazemId, ClienteId, LoadingRecord, ScheduleRef, StageData};
use crate::errors::StoreError;
use crate::stages::{all_stages, StageId};
use crate::utils::{format_iso8601, parse_timestamp, Timestamp};

/// A row as exchanged with the relational store.
pub type RecordRow = Map<String, Value>;

/// Current stage column.
pub const COL_CURRENT_STAGE: &str = "etapa_atual";
/// Invoice number column.
pub const COL_INVOICE_NUMBER: &str = "numero_nf";
/// Last writer column.
pub const COL_UPDATED_BY: &str = "updated_by";
/// Optimistic-concurrency version column.
pub const COL_VERSION: &str = "versao";

/// Encodes a record into its row.
#[must_use]
pub fn to_row(record: &LoadingRecord) -> RecordRow {
    let schedule = record.schedule();
    let mut row = Map::new();
    row.insert("id".into(), json!(record.id()));
    row.insert("agendamento_id".into(), json!(schedule.schedule_id));
    row.insert("cliente_id".into(), json!(schedule.cliente_id));
    row.insert("armazem_id".into(), json!(schedule.armazem_id));
    row.insert("placa_caminhao".into(), json!(schedule.truck_plate));
    row.insert("motorista_nome".into(), json!(schedule.driver_name));
    row.insert("motorista_documento".into(), json!(schedule.driver_document));
    row.insert("quantidade".into(), json!(schedule.quantity));
    row.insert("numero_pedido_interno".into(), json!(schedule.internal_order_number));
    row.insert(COL_CURRENT_STAGE.into(), json!(record.current_stage().get()));
    row.insert(COL_INVOICE_NUMBER.into(), json!(record.invoice_number()));
    row.insert(COL_UPDATED_BY.into(), json!(record.updated_by()));
    row.insert(COL_VERSION.into(), json!(record.version()));
    row.insert("created_at".into(), json!(format_iso8601(&record.created_at())));
    row.insert(
        "updated_at".into(),
        json!(record.updated_at().as_ref().map(format_iso8601)),
    );

    for (stage, data) in record.stages() {
        let def = stage.definition();
        if let Some(column) = def.timestamp_field {
            row.insert(column.into(), json!(data.completed_at.as_ref().map(format_iso8601)));
        }
        if let Some(column) = def.observation_field {
            row.insert(column.into(), json!(data.observation));
        }
        for (i, column) in def.artifact_fields.iter().enumerate() {
            row.insert((*column).into(), json!(data.artifact_urls.get(i)));
        }
    }

    row
}

/// Decodes a row and checks the record invariants.
pub fn from_row(row: &RecordRow) -> Result<LoadingRecord, StoreError> {
    let id = uuid_column(row, "id")?;

    let stage_number = row
        .get(COL_CURRENT_STAGE)
        .and_then(Value::as_u64)
        .ok_or_else(|| corrupt(COL_CURRENT_STAGE, "missing or not an integer"))?;
    let current_stage = u8::try_from(stage_number)
        .ok()
        .and_then(StageId::new)
        .ok_or_else(|| corrupt(COL_CURRENT_STAGE, &format!("{stage_number} is outside 1..=6")))?;

    let mut schedule = ScheduleRef::new(
        ClienteId(uuid_column(row, "cliente_id")?),
        ArmazemId(uuid_column(row, "armazem_id")?),
        required_string(row, "placa_caminhao")?,
        required_string(row, "motorista_nome")?,
        row.get("quantidade")
            .and_then(Value::as_f64)
            .ok_or_else(|| corrupt("quantidade", "missing or not a number"))?,
    );
    schedule.schedule_id = uuid_column(row, "agendamento_id")?;
    schedule.driver_document = optional_string(row, "motorista_documento")?;
    schedule.internal_order_number = optional_string(row, "numero_pedido_interno")?;

    let mut stage_data: [StageData; 6] = Default::default();
    for (def, data) in all_stages().iter().zip(stage_data.iter_mut()) {
        if let Some(column) = def.timestamp_field {
            data.completed_at = optional_timestamp(row, column)?;
        }
        if let Some(column) = def.observation_field {
            data.observation = optional_string(row, column)?;
        }
        for column in def.artifact_fields {
            if let Some(url) = optional_string(row, column)? {
                data.artifact_urls.push(url);
            }
        }
    }

    let updated_by = optional_string(row, COL_UPDATED_BY)?
        .map(|s| Uuid::parse_str(&s).map_err(|e| corrupt(COL_UPDATED_BY, &e.to_string())))
        .transpose()?;
    let version = row
        .get(COL_VERSION)
        .and_then(Value::as_u64)
        .ok_or_else(|| corrupt(COL_VERSION, "missing or not an integer"))?;
    let created_at =
        optional_timestamp(row, "created_at")?.ok_or_else(|| corrupt("created_at", "missing"))?;

    LoadingRecord::from_parts(
        id,
        schedule,
        current_stage,
        stage_data,
        optional_string(row, COL_INVOICE_NUMBER)?,
        updated_by,
        version,
        created_at,
        optional_timestamp(row, "updated_at")?,
    )
    .map_err(|violation| StoreError::Corrupt(violation.to_string()))
}

fn corrupt(column: &str, detail: &str) -> StoreError {
    StoreError::Corrupt(format!("column '{column}': {detail}"))
}

fn optional_string(row: &RecordRow, column: &str) -> Result<Option<String>, StoreError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(corrupt(column, &format!("expected text, found {other}"))),
    }
}

fn required_string(row: &RecordRow, column: &str) -> Result<String, StoreError> {
    optional_string(row, column)?.ok_or_else(|| corrupt(column, "missing"))
}

fn uuid_column(row: &RecordRow, column: &str) -> Result<Uuid, StoreError> {
    let text = required_string(row, column)?;
    Uuid::parse_str(&text).map_err(|e| corrupt(column, &e.to_string()))
}

fn optional_timestamp(row: &RecordRow, column: &str) -> Result<Option<Timestamp>, StoreError> {
    optional_string(row, column)?
        .map(|text| parse_timestamp(&text).map_err(|e| corrupt(column, &e.to_string())))
        .transpose()
}
