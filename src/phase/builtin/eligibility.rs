//! Inclusion and exclusion criteria

use super::{set_records, ClientBinding, ELIGIBILITY};
use crate::client::ExtractionClient;
use crate::context::{PropertyValue, Record, SharedContext};
use crate::phase::{
    ContextHints, ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct EligibilityPhase {
    binding: ClientBinding,
}

impl EligibilityPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(ELIGIBILITY, "Eligibility Criteria", 2)
            .optional()
            .with_output_file("03_eligibility_criteria.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

fn tagged(records: Vec<Record>, category: &str) -> impl Iterator<Item = Record> + '_ {
    records
        .into_iter()
        .map(move |r| r.with_property("category", PropertyValue::String(category.to_string())))
}

#[async_trait]
impl Phase for EligibilityPhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    fn context_requirements(&self, context: &SharedContext) -> ContextHints {
        let mut hints = ContextHints::new();
        hints.insert_non_empty("indication", context.facts.indication.clone());
        hints.insert_non_empty("study_phase", context.facts.study_phase.clone());
        hints
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        self.binding.extract(request).await
    }

    fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
        let Some(payload) = &result.payload else {
            return;
        };
        let criteria: Vec<Record> = tagged(payload.records("inclusion", "inclusion"), "inclusion")
            .chain(tagged(payload.records("exclusion", "exclusion"), "exclusion"))
            .collect();
        set_records(&mut context.narrative.eligibility_criteria, criteria);
    }
}
