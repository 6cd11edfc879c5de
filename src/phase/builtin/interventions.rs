//! Study interventions and administrable products

use super::{name_hint, set_records, ClientBinding, INTERVENTIONS};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{
    ContextHints, ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct InterventionsPhase {
    binding: ClientBinding,
}

impl InterventionsPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(INTERVENTIONS, "Interventions", 5)
            .optional()
            .with_output_file("06_interventions.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for InterventionsPhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    fn context_requirements(&self, context: &SharedContext) -> ContextHints {
        let mut hints = ContextHints::new();
        name_hint(&mut hints, "arms", &context.design.arms);
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
        let group = &mut context.interventions;
        set_records(&mut group.interventions, payload.records("interventions", "intervention"));
        set_records(&mut group.products, payload.records("products", "product"));
    }
}
