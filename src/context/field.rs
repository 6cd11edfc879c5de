//! Named context fields
//!
//! The ownership table and the pipeline config refer to context state by
//! these names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every individually ownable field of [`SharedContext`](super::SharedContext)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    // Study facts
    StudyTitle,
    StudyId,
    Sponsor,
    Indication,
    StudyPhase,
    StudyIdentifiers,
    // Design
    Arms,
    Epochs,
    StudyCells,
    // Schedule
    Encounters,
    Activities,
    Timings,
    // Interventions
    Interventions,
    Products,
    // Narrative
    Objectives,
    Endpoints,
    EligibilityCriteria,
    NarrativeSections,
    Abbreviations,
}

/// Storage shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Records,
}

impl ContextField {
    pub const ALL: [ContextField; 19] = [
        Self::StudyTitle,
        Self::StudyId,
        Self::Sponsor,
        Self::Indication,
        Self::StudyPhase,
        Self::StudyIdentifiers,
        Self::Arms,
        Self::Epochs,
        Self::StudyCells,
        Self::Encounters,
        Self::Activities,
        Self::Timings,
        Self::Interventions,
        Self::Products,
        Self::Objectives,
        Self::Endpoints,
        Self::EligibilityCriteria,
        Self::NarrativeSections,
        Self::Abbreviations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyTitle => "study_title",
            Self::StudyId => "study_id",
            Self::Sponsor => "sponsor",
            Self::Indication => "indication",
            Self::StudyPhase => "study_phase",
            Self::StudyIdentifiers => "study_identifiers",
            Self::Arms => "arms",
            Self::Epochs => "epochs",
            Self::StudyCells => "study_cells",
            Self::Encounters => "encounters",
            Self::Activities => "activities",
            Self::Timings => "timings",
            Self::Interventions => "interventions",
            Self::Products => "products",
            Self::Objectives => "objectives",
            Self::Endpoints => "endpoints",
            Self::EligibilityCriteria => "eligibility_criteria",
            Self::NarrativeSections => "narrative_sections",
            Self::Abbreviations => "abbreviations",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::StudyTitle
            | Self::StudyId
            | Self::Sponsor
            | Self::Indication
            | Self::StudyPhase => FieldKind::Text,
            _ => FieldKind::Records,
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name does not match any context field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown context field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for ContextField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}
