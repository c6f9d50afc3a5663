//! Input of a single stage advance.

use crate::artifacts::ArtifactPayload;
use crate::errors::{LoadflowError, Result};
use crate::stages::{ArtifactKind, StageDefinition, StageId};

const PHOTO_EXTENSIONS: [&str; 4] = ["jpg", "png", "webp", "heic"];

/// What the operator submits when leaving the current stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceInput {
    /// Free-text observation. Blank text counts as absent.
    pub observation: Option<String>,
    /// Photo (stages 1-4) or invoice PDF (stage 5).
    pub primary_artifact: Option<ArtifactPayload>,
    /// Invoice XML, documentation stage only.
    pub secondary_artifact: Option<ArtifactPayload>,
    /// Invoice number, documentation stage only.
    pub invoice_number: Option<String>,
}

impl AdvanceInput {
    /// Creates an empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the observation.
    #[must_use]
    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    /// Sets the primary artifact.
    #[must_use]
    pub fn with_primary_artifact(mut self, payload: ArtifactPayload) -> Self {
        self.primary_artifact = Some(payload);
        self
    }

    /// Sets the secondary artifact.
    #[must_use]
    pub fn with_secondary_artifact(mut self, payload: ArtifactPayload) -> Self {
        self.secondary_artifact = Some(payload);
        self
    }

    /// Sets the invoice number.
    #[must_use]
    pub fn with_invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = Some(number.into());
        self
    }

    /// Trimmed observation, `None` when blank.
    #[must_use]
    pub fn normalized_observation(&self) -> Option<String> {
        trimmed(self.observation.as_deref())
    }

    /// Trimmed invoice number, `None` when blank.
    #[must_use]
    pub fn normalized_invoice_number(&self) -> Option<String> {
        trimmed(self.invoice_number.as_deref())
    }

    /// Checks the input against the stage being left.
    ///
    /// The missing-artifact check runs first so that it wins over every other
    /// validation failure.
    pub fn validate(&self, stage: &StageDefinition, max_artifact_bytes: usize) -> Result<()> {
        let invalid = |message: String| LoadflowError::validation(message, Some(stage.id));

        if let Some(kind) = stage.primary_artifact {
            let payload = self
                .primary_artifact
                .as_ref()
                .ok_or_else(|| invalid(format!("stage {} ({}) requires a {kind}", stage.id, stage.name)))?;
            check_payload(payload, kind, false, max_artifact_bytes).map_err(invalid)?;
        } else if self.primary_artifact.is_some() {
            return Err(invalid(format!("stage {} does not accept artifacts", stage.id)));
        }

        if let Some(payload) = &self.secondary_artifact {
            let Some(kind) = stage.primary_artifact.filter(|_| stage.allows_secondary_artifact) else {
                return Err(invalid(format!("stage {} does not accept a secondary artifact", stage.id)));
            };
            check_payload(payload, kind, true, max_artifact_bytes).map_err(invalid)?;
        }

        if self.invoice_number.is_some() && stage.id != StageId::DOCUMENTATION {
            return Err(invalid(format!(
                "invoice number is only accepted at stage {}",
                StageId::DOCUMENTATION
            )));
        }

        Ok(())
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn check_payload(
    payload: &ArtifactPayload,
    kind: ArtifactKind,
    secondary: bool,
    max_bytes: usize,
) -> std::result::Result<(), String> {
    if payload.is_empty() {
        return Err(format!("{kind} artifact is empty"));
    }
    if payload.len() > max_bytes {
        return Err(format!(
            "{kind} artifact has {} bytes, limit is {max_bytes}",
            payload.len()
        ));
    }

    let ext = payload.extension();
    let accepted = match (kind, secondary) {
        (ArtifactKind::Photo, _) => PHOTO_EXTENSIONS.contains(&ext.as_str()),
        (ArtifactKind::Document, false) => ext == "pdf",
        (ArtifactKind::Document, true) => ext == "xml",
    };
    if accepted {
        Ok(())
    } else {
        Err(format!(
            "{kind} artifact of type '{}' is not accepted",
            payload.content_type()
        ))
    }
}
