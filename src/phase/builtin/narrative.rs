//! Narrative sections and abbreviations

use super::{set_records, ClientBinding, NARRATIVE};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct NarrativePhase {
    binding: ClientBinding,
}

impl NarrativePhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(NARRATIVE, "Narrative Content", 7)
            .optional()
            .with_output_file("08_narrative.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for NarrativePhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        self.binding.extract(request).await
    }

    fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
        let Some(payload) = &result.payload else {
            return;
        };
        let narrative = &mut context.narrative;
        set_records(
            &mut narrative.narrative_sections,
            payload.records("sections", "narrative_section"),
        );
        set_records(
            &mut narrative.abbreviations,
            payload.records("abbreviations", "abbreviation"),
        );
    }
}
