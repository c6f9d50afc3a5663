//! Static definition of the six loading stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a loading stage, always within `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StageId(u8);

impl StageId {
    /// Arrival at the warehouse.
    pub const ARRIVAL: Self = Self(1);
    /// Documentation (invoice PDF + optional XML).
    pub const DOCUMENTATION: Self = Self(5);
    /// Terminal stage.
    pub const FINALIZED: Self = Self(6);

    /// Creates a stage id, returning `None` outside `1..=6`.
    #[must_use]
    pub const fn new(id: u8) -> Option<Self> {
        if id >= 1 && id <= 6 {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the following stage, or `None` from the terminal stage.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// Returns true for the finalized stage.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.0 == Self::FINALIZED.0
    }

    /// Iterates over every stage id in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=6).map(Self)
    }

    /// Returns the static definition of this stage.
    #[must_use]
    pub fn definition(self) -> &'static StageDefinition {
        &STAGES[usize::from(self.0 - 1)]
    }
}

impl TryFrom<u8> for StageId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("stage id {value} is outside 1..=6"))
    }
}

impl From<StageId> for u8 {
    fn from(id: StageId) -> Self {
        id.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of artifact a stage collects, which also selects its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Photo evidence (stages 1-4).
    Photo,
    /// Fiscal documents (stage 5).
    Document,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Immutable description of one lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    /// Stage id.
    pub id: StageId,
    /// Display name.
    pub name: &'static str,
    /// Column holding the completion timestamp.
    pub timestamp_field: Option<&'static str>,
    /// Column holding the free-text observation.
    pub observation_field: Option<&'static str>,
    /// Columns holding artifact URLs, primary first.
    pub artifact_fields: &'static [&'static str],
    /// Artifact required to leave this stage, if any.
    pub primary_artifact: Option<ArtifactKind>,
    /// Whether an optional secondary artifact is accepted.
    pub allows_secondary_artifact: bool,
}

impl StageDefinition {
    /// Returns true if leaving this stage requires a primary artifact.
    #[must_use]
    pub const fn requires_artifact(&self) -> bool {
        self.primary_artifact.is_some()
    }

    /// Maximum number of artifact URLs this stage can hold.
    #[must_use]
    pub const fn max_artifacts(&self) -> usize {
        self.artifact_fields.len()
    }
}

static STAGES: [StageDefinition; 6] = [
    StageDefinition {
        id: StageId(1),
        name: "Chegada",
        timestamp_field: Some("data_chegada"),
        observation_field: Some("observacao_chegada"),
        artifact_fields: &["url_foto_chegada"],
        primary_artifact: Some(ArtifactKind::Photo),
        allows_secondary_artifact: false,
    },
    StageDefinition {
        id: StageId(2),
        name: "Início do carregamento",
        timestamp_field: Some("data_inicio_carregamento"),
        observation_field: Some("observacao_inicio_carregamento"),
        artifact_fields: &["url_foto_inicio_carregamento"],
        primary_artifact: Some(ArtifactKind::Photo),
        allows_secondary_artifact: false,
    },
    StageDefinition {
        id: StageId(3),
        name: "Carregando",
        timestamp_field: Some("data_carregando"),
        observation_field: Some("observacao_carregando"),
        artifact_fields: &["url_foto_carregando"],
        primary_artifact: Some(ArtifactKind::Photo),
        allows_secondary_artifact: false,
    },
    StageDefinition {
        id: StageId(4),
        name: "Carregamento finalizado",
        timestamp_field: Some("data_carregamento_finalizado"),
        observation_field: Some("observacao_carregamento_finalizado"),
        artifact_fields: &["url_foto_carregamento_finalizado"],
        primary_artifact: Some(ArtifactKind::Photo),
        allows_secondary_artifact: false,
    },
    StageDefinition {
        id: StageId(5),
        name: "Documentação",
        timestamp_field: Some("data_documentacao"),
        observation_field: Some("observacao_documentacao"),
        artifact_fields: &["url_nota_fiscal_pdf", "url_nota_fiscal_xml"],
        primary_artifact: Some(ArtifactKind::Document),
        allows_secondary_artifact: true,
    },
    StageDefinition {
        id: StageId(6),
        name: "Finalizado",
        timestamp_field: None,
        observation_field: None,
        artifact_fields: &[],
        primary_artifact: None,
        allows_secondary_artifact: false,
    },
];

/// Looks up a stage by numeric id.
#[must_use]
pub fn stage_by_id(id: u8) -> Option<&'static StageDefinition> {
    StageId::new(id).map(StageId::definition)
}

/// Returns all six stages in order.
#[must_use]
pub fn all_stages() -> &'static [StageDefinition; 6] {
    &STAGES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_ordered() {
        let ids: Vec<u8> = all_stages().iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_stage_by_id_bounds() {
        assert!(stage_by_id(0).is_none());
        assert!(stage_by_id(7).is_none());
        assert_eq!(stage_by_id(1).unwrap().name, "Chegada");
    }

    #[test]
    fn test_only_documentation_allows_secondary() {
        let secondary: Vec<u8> = all_stages()
            .iter()
            .filter(|s| s.allows_secondary_artifact)
            .map(|s| s.id.get())
            .collect();
        assert_eq!(secondary, vec![5]);
        assert_eq!(StageId::DOCUMENTATION.definition().max_artifacts(), 2);
    }

    #[test]
    fn test_terminal_stage_has_no_fields() {
        let finalized = StageId::FINALIZED.definition();
        assert!(finalized.timestamp_field.is_none());
        assert!(finalized.observation_field.is_none());
        assert!(!finalized.requires_artifact());
        assert!(StageId::FINALIZED.next().is_none());
    }

    #[test]
    fn test_artifact_kinds_by_stage() {
        for id in 1..=4 {
            assert_eq!(stage_by_id(id).unwrap().primary_artifact, Some(ArtifactKind::Photo));
        }
        assert_eq!(
            StageId::DOCUMENTATION.definition().primary_artifact,
            Some(ArtifactKind::Document)
        );
    }

    #[test]
    fn test_stage_id_serde() {
        let json = serde_json::to_string(&StageId::DOCUMENTATION).unwrap();
        assert_eq!(json, "5");
        assert!(serde_json::from_str::<StageId>("9").is_err());
    }
}
