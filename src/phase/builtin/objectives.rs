//! Objectives and endpoints

use super::{set_records, ClientBinding, OBJECTIVES};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{
    ContextHints, ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ObjectivesPhase {
    binding: ClientBinding,
}

impl ObjectivesPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(OBJECTIVES, "Objectives & Endpoints", 3)
            .optional()
            .with_output_file("04_objectives_endpoints.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for ObjectivesPhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    fn context_requirements(&self, context: &SharedContext) -> ContextHints {
        let mut hints = ContextHints::new();
        hints.insert_non_empty("study_title", context.facts.study_title.clone());
        hints.insert_non_empty("indication", context.facts.indication.clone());
        hints
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        self.binding.extract(request).await
    }

    fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
        let Some(payload) = &result.payload else {
            return;
        };
        let narrative = &mut context.narrative;
        set_records(&mut narrative.objectives, payload.records("objectives", "objective"));
        set_records(&mut narrative.endpoints, payload.records("endpoints", "endpoint"));
    }
}
