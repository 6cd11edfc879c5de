//! Built-in protocol extraction phases
//!
//! | Phase | Reads from context | Writes |
//! |---|---|---|
//! | `metadata` | - | study facts |
//! | `eligibility` | indication, study phase | eligibility criteria |
//! | `objectives` | title, indication | objectives, endpoints |
//! | `design` | - | arms, epochs, study cells |
//! | `interventions` | arms, indication | interventions, products |
//! | `scheduling` | arms, epochs | encounters, activities, timings |
//! | `narrative` | - | narrative sections, abbreviations |
//!
//! All of them delegate the extraction itself to an [`ExtractionClient`].

mod design;
mod eligibility;
mod interventions;
mod metadata;
mod narrative;
mod objectives;
mod scheduling;

pub use design::DesignPhase;
pub use eligibility::EligibilityPhase;
pub use interventions::InterventionsPhase;
pub use metadata::MetadataPhase;
pub use narrative::NarrativePhase;
pub use objectives::ObjectivesPhase;
pub use scheduling::SchedulingPhase;

use super::traits::PhaseRegistry;
use super::types::{ContextHints, ExtractionRequest, PhaseConfig, PhaseError, PhaseOutput, PhasePayload};
use crate::client::{ClientRequest, ExtractionClient};
use crate::context::{Record, RecordSet};
use std::sync::Arc;

pub const METADATA: &str = "metadata";
pub const ELIGIBILITY: &str = "eligibility";
pub const OBJECTIVES: &str = "objectives";
pub const DESIGN: &str = "design";
pub const INTERVENTIONS: &str = "interventions";
pub const SCHEDULING: &str = "scheduling";
pub const NARRATIVE: &str = "narrative";

/// Registry holding every built-in phase, all backed by `client`
pub fn registry(client: Arc<dyn ExtractionClient>) -> PhaseRegistry {
    let mut registry = PhaseRegistry::new();
    registry.register(MetadataPhase::new(client.clone()));
    registry.register(EligibilityPhase::new(client.clone()));
    registry.register(ObjectivesPhase::new(client.clone()));
    registry.register(DesignPhase::new(client.clone()));
    registry.register(InterventionsPhase::new(client.clone()));
    registry.register(SchedulingPhase::new(client.clone()));
    registry.register(NarrativePhase::new(client));
    registry
}

/// A phase's config paired with the client that runs its extraction
pub(crate) struct ClientBinding {
    config: PhaseConfig,
    client: Arc<dyn ExtractionClient>,
}

impl ClientBinding {
    pub(crate) fn new(config: PhaseConfig, client: Arc<dyn ExtractionClient>) -> Self {
        Self { config, client }
    }

    pub(crate) fn config(&self) -> &PhaseConfig {
        &self.config
    }

    pub(crate) fn is_available(&self) -> bool {
        self.client.supports(&self.config.name)
    }

    /// One round-trip to the client, mapped onto the phase contract
    pub(crate) async fn extract(
        &self,
        request: &ExtractionRequest<'_>,
    ) -> Result<PhaseOutput, PhaseError> {
        let client_request = ClientRequest {
            phase: self.config.name.clone(),
            document: request.document.path.clone(),
            model: request.model.to_string(),
            hints: request.hints.clone(),
            upstream_artifact: request.upstream_artifact.map(|p| p.to_path_buf()),
        };

        let outcome = self.client.extract(&client_request).await?;
        if !outcome.success {
            return Err(PhaseError::Extraction(
                outcome
                    .error
                    .unwrap_or_else(|| "extraction reported failure".to_string()),
            ));
        }

        let payload = PhasePayload::from_value(outcome.payload.ok_or(PhaseError::EmptyPayload)?)?;
        Ok(PhaseOutput::new(payload).with_confidence(outcome.confidence))
    }
}

/// Replace a text fact when the payload carries one
pub(crate) fn set_text(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}

/// Replace a record list when the payload produced any records
pub(crate) fn set_records(set: &mut RecordSet, records: Vec<Record>) {
    if !records.is_empty() {
        set.replace_all(records);
    }
}

/// Names of a record set as a hint value
pub(crate) fn name_hint(hints: &mut ContextHints, key: &str, set: &RecordSet) {
    hints.insert_non_empty(key, set.names());
}
