//! SharedContext: the accumulated record passed across phases

use super::field::ContextField;
use super::record_set::RecordSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Facts about the study itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyFacts {
    pub study_title: Option<String>,
    pub study_id: Option<String>,
    pub sponsor: Option<String>,
    pub indication: Option<String>,
    pub study_phase: Option<String>,
    /// Secondary identifiers (registry numbers, sponsor codes)
    #[serde(default)]
    pub study_identifiers: RecordSet,
}

/// Structural design elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignGroup {
    #[serde(default)]
    pub arms: RecordSet,
    #[serde(default)]
    pub epochs: RecordSet,
    /// Arm x epoch cells
    #[serde(default)]
    pub study_cells: RecordSet,
}

/// Scheduling and timing elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleGroup {
    #[serde(default)]
    pub encounters: RecordSet,
    #[serde(default)]
    pub activities: RecordSet,
    #[serde(default)]
    pub timings: RecordSet,
}

/// Intervention and treatment elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionGroup {
    #[serde(default)]
    pub interventions: RecordSet,
    #[serde(default)]
    pub products: RecordSet,
}

/// Narrative elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeGroup {
    #[serde(default)]
    pub objectives: RecordSet,
    #[serde(default)]
    pub endpoints: RecordSet,
    #[serde(default)]
    pub eligibility_criteria: RecordSet,
    #[serde(default)]
    pub narrative_sections: RecordSet,
    #[serde(default)]
    pub abbreviations: RecordSet,
}

/// Borrowed view of one field
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Text(&'a Option<String>),
    Records(&'a RecordSet),
}

impl FieldRef<'_> {
    /// Blank text and empty lists count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) => value.as_deref().map_or(true, |s| s.trim().is_empty()),
            Self::Records(set) => set.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Text(_) if self.is_empty() => 0,
            Self::Text(_) => 1,
            Self::Records(set) => set.len(),
        }
    }
}

enum FieldMut<'a> {
    Text(&'a mut Option<String>),
    Records(&'a mut RecordSet),
}

/// The single mutable record accumulated over a run.
///
/// One instance per run, owned by the orchestrator. During a multi-phase wave
/// each phase works on its own [`snapshot`](Self::snapshot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedContext {
    #[serde(default)]
    pub facts: StudyFacts,
    #[serde(default)]
    pub design: DesignGroup,
    #[serde(default)]
    pub schedule: ScheduleGroup,
    #[serde(default)]
    pub interventions: InterventionGroup,
    #[serde(default)]
    pub narrative: NarrativeGroup,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep, fully independent copy.
    ///
    /// Every group owns its collections, so the clone shares nothing mutable
    /// with `self`.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn field(&self, field: ContextField) -> FieldRef<'_> {
        use ContextField as F;
        match field {
            F::StudyTitle => FieldRef::Text(&self.facts.study_title),
            F::StudyId => FieldRef::Text(&self.facts.study_id),
            F::Sponsor => FieldRef::Text(&self.facts.sponsor),
            F::Indication => FieldRef::Text(&self.facts.indication),
            F::StudyPhase => FieldRef::Text(&self.facts.study_phase),
            F::StudyIdentifiers => FieldRef::Records(&self.facts.study_identifiers),
            F::Arms => FieldRef::Records(&self.design.arms),
            F::Epochs => FieldRef::Records(&self.design.epochs),
            F::StudyCells => FieldRef::Records(&self.design.study_cells),
            F::Encounters => FieldRef::Records(&self.schedule.encounters),
            F::Activities => FieldRef::Records(&self.schedule.activities),
            F::Timings => FieldRef::Records(&self.schedule.timings),
            F::Interventions => FieldRef::Records(&self.interventions.interventions),
            F::Products => FieldRef::Records(&self.interventions.products),
            F::Objectives => FieldRef::Records(&self.narrative.objectives),
            F::Endpoints => FieldRef::Records(&self.narrative.endpoints),
            F::EligibilityCriteria => FieldRef::Records(&self.narrative.eligibility_criteria),
            F::NarrativeSections => FieldRef::Records(&self.narrative.narrative_sections),
            F::Abbreviations => FieldRef::Records(&self.narrative.abbreviations),
        }
    }

    fn field_mut(&mut self, field: ContextField) -> FieldMut<'_> {
        use ContextField as F;
        match field {
            F::StudyTitle => FieldMut::Text(&mut self.facts.study_title),
            F::StudyId => FieldMut::Text(&mut self.facts.study_id),
            F::Sponsor => FieldMut::Text(&mut self.facts.sponsor),
            F::Indication => FieldMut::Text(&mut self.facts.indication),
            F::StudyPhase => FieldMut::Text(&mut self.facts.study_phase),
            F::StudyIdentifiers => FieldMut::Records(&mut self.facts.study_identifiers),
            F::Arms => FieldMut::Records(&mut self.design.arms),
            F::Epochs => FieldMut::Records(&mut self.design.epochs),
            F::StudyCells => FieldMut::Records(&mut self.design.study_cells),
            F::Encounters => FieldMut::Records(&mut self.schedule.encounters),
            F::Activities => FieldMut::Records(&mut self.schedule.activities),
            F::Timings => FieldMut::Records(&mut self.schedule.timings),
            F::Interventions => FieldMut::Records(&mut self.interventions.interventions),
            F::Products => FieldMut::Records(&mut self.interventions.products),
            F::Objectives => FieldMut::Records(&mut self.narrative.objectives),
            F::Endpoints => FieldMut::Records(&mut self.narrative.endpoints),
            F::EligibilityCriteria => FieldMut::Records(&mut self.narrative.eligibility_criteria),
            F::NarrativeSections => FieldMut::Records(&mut self.narrative.narrative_sections),
            F::Abbreviations => FieldMut::Records(&mut self.narrative.abbreviations),
        }
    }

    pub fn is_field_empty(&self, field: ContextField) -> bool {
        self.field(field).is_empty()
    }

    /// Overwrite one field with the value `source` holds for it
    pub fn copy_field(&mut self, source: &SharedContext, field: ContextField) {
        match (self.field_mut(field), source.field(field)) {
            (FieldMut::Text(dst), FieldRef::Text(src)) => *dst = src.clone(),
            (FieldMut::Records(dst), FieldRef::Records(src)) => *dst = src.clone(),
            // Both sides resolve the same field, so the shapes always agree.
            _ => debug_assert!(false, "field {} resolved to mismatched shapes", field),
        }
    }

    /// Reset one field to its empty value
    pub fn clear_field(&mut self, field: ContextField) {
        match self.field_mut(field) {
            FieldMut::Text(value) => *value = None,
            FieldMut::Records(set) => set.clear(),
        }
    }

    /// Whether `self` and `other` hold different values for `field`
    pub fn field_differs(&self, other: &SharedContext, field: ContextField) -> bool {
        match (self.field(field), other.field(field)) {
            (FieldRef::Text(a), FieldRef::Text(b)) => a != b,
            (FieldRef::Records(a), FieldRef::Records(b)) => a != b,
            _ => true,
        }
    }

    /// Fields whose values differ between two states of a context
    pub fn changed_fields(before: &SharedContext, after: &SharedContext) -> BTreeSet<ContextField> {
        ContextField::ALL
            .iter()
            .copied()
            .filter(|f| before.field_differs(after, *f))
            .collect()
    }

    /// Fields currently holding a non-empty value
    pub fn populated_fields(&self) -> BTreeSet<ContextField> {
        ContextField::ALL
            .iter()
            .copied()
            .filter(|f| !self.is_field_empty(*f))
            .collect()
    }

    /// Per-field element counts (text fields count as 0 or 1)
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        ContextField::ALL
            .iter()
            .map(|f| (f.as_str(), self.field(*f).len()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        ContextField::ALL.iter().all(|f| self.is_field_empty(*f))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl StudyFacts {
    /// Best available label for the study
    pub fn display_title(&self) -> Option<&str> {
        self.study_title
            .as_deref()
            .or(self.study_id.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}
