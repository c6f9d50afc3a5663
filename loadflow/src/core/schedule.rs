//! Schedule entry a loading record is created from.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use super::{ArmazemId, ClienteId};
use crate::errors::{LoadflowError, Result};

/// Legacy (`ABC1234`, `ABC-1234`) and Mercosul (`ABC1D23`) plates.
const PLATE_PATTERN: &str = r"^[A-Z]{3}-?[0-9][A-Z0-9][0-9]{2}$";

#[allow(clippy::expect_used)]
fn plate_regex() -> &'static Regex {
    static PLATE: OnceLock<Regex> = OnceLock::new();
    PLATE.get_or_init(|| Regex::new(PLATE_PATTERN).expect("plate pattern is a valid regex"))
}

/// Reference to the external schedule entry (`agendamentos`).
///
/// The scheduling entity owns these values; the loading record only copies
/// them at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRef {
    /// Schedule entry id.
    pub schedule_id: Uuid,
    /// Customer the cargo belongs to.
    pub cliente_id: ClienteId,
    /// Warehouse performing the loading.
    pub armazem_id: ArmazemId,
    /// Truck plate.
    pub truck_plate: String,
    /// Driver name.
    pub driver_name: String,
    /// Driver document (CPF/CNH).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_document: Option<String>,
    /// Quantity to load, in tonnes.
    pub quantity: f64,
    /// Internal order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_order_number: Option<String>,
}

impl ScheduleRef {
    /// Creates a schedule reference with the mandatory fields.
    #[must_use]
    pub fn new(
        cliente_id: ClienteId,
        armazem_id: ArmazemId,
        truck_plate: impl Into<String>,
        driver_name: impl Into<String>,
        quantity: f64,
    ) -> Self {
        Self {
            schedule_id: Uuid::new_v4(),
            cliente_id,
            armazem_id,
            truck_plate: truck_plate.into(),
            driver_name: driver_name.into(),
            driver_document: None,
            quantity,
            internal_order_number: None,
        }
    }

    /// Sets the driver document.
    #[must_use]
    pub fn with_driver_document(mut self, document: impl Into<String>) -> Self {
        self.driver_document = Some(document.into());
        self
    }

    /// Sets the internal order number.
    #[must_use]
    pub fn with_internal_order_number(mut self, number: impl Into<String>) -> Self {
        self.internal_order_number = Some(number.into());
        self
    }

    /// Returns the plate upper-cased with surrounding whitespace removed.
    #[must_use]
    pub fn normalized_plate(&self) -> String {
        self.truck_plate.trim().to_uppercase()
    }

    /// Checks the fields a loading record depends on.
    pub fn validate(&self) -> Result<()> {
        if !plate_regex().is_match(&self.normalized_plate()) {
            return Err(LoadflowError::validation(
                format!("invalid truck plate '{}'", self.truck_plate),
                None,
            ));
        }
        if self.driver_name.trim().is_empty() {
            return Err(LoadflowError::validation("driver name is required", None));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(LoadflowError::validation(
                format!("quantity must be positive, got {}", self.quantity),
                None,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(plate: &str) -> ScheduleRef {
        ScheduleRef::new(ClienteId::new_v4(), ArmazemId::new_v4(), plate, "João Silva", 32.5)
    }

    #[test]
    fn test_accepts_legacy_and_mercosul_plates() {
        assert!(schedule("ABC1234").validate().is_ok());
        assert!(schedule("abc-1234").validate().is_ok());
        assert!(schedule("BRA2E19").validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_plate() {
        let err = schedule("12ABCDE").validate().unwrap_err();
        assert!(matches!(err, LoadflowError::Validation { .. }));
    }

    #[test]
    fn test_rejects_blank_driver_and_bad_quantity() {
        let mut entry = schedule("ABC1234");
        entry.driver_name = "  ".to_string();
        assert!(entry.validate().is_err());

        let mut entry = schedule("ABC1234");
        entry.quantity = 0.0;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_builder_sets_optional_fields() {
        let entry = schedule("ABC1234")
            .with_driver_document("123.456.789-00")
            .with_internal_order_number("PED-42");
        assert_eq!(entry.driver_document.as_deref(), Some("123.456.789-00"));
        assert_eq!(entry.internal_order_number.as_deref(), Some("PED-42"));
    }
}
